use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use storybook::core::config::Config;
use storybook::core::credentials::{ApiConfig, CredentialStore};
use storybook::core::io::NativeStorage;
use storybook::services::export::BookExporter;
use storybook::services::factory::create_service;
use storybook::services::setup::{run_login, run_story_form};
use storybook::services::workflow::StoryPipeline;
use storybook::ui::{prompt_action, BookViewer, ViewerAction};

enum Next {
    NewStory,
    Logout,
    Quit,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = Config::load()?;
    config.ensure_directories()?;

    let store = CredentialStore::new(Arc::new(NativeStorage::new(&config.storage_folder)));
    let exporter = BookExporter::new(
        Arc::new(NativeStorage::new(&config.output_folder)),
        config.provider.request_timeout(),
    )
    .with_prompts(config.include_prompts_in_export);

    println!("Welcome to Story Creator");

    'session: loop {
        let api_config = run_login(&store).await?;

        loop {
            match create_story(&config, &api_config, &exporter).await? {
                Next::NewStory => continue,
                Next::Logout => {
                    store.clear().await?;
                    println!("Logged out.");
                    continue 'session;
                }
                Next::Quit => break 'session,
            }
        }
    }

    println!("Goodbye!");
    Ok(())
}

async fn create_story(config: &Config, api_config: &ApiConfig, exporter: &BookExporter) -> Result<Next> {
    let services = match create_service(api_config, &config.provider) {
        Ok(services) => services,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(Next::Logout);
        }
    };
    let pipeline = StoryPipeline::from_services(services)
        .with_image_delay(Duration::from_millis(config.image_request_delay_ms))
        .with_progress(true);

    // The form and the generation run are modal, so only one run is ever in flight
    let story = loop {
        match run_story_form() {
            Ok(request) => {
                println!("Creating story...");
                match pipeline.generate(&request).await {
                    Ok(story) if story.is_empty() => {
                        eprintln!("Error: the generator returned no scenes.");
                    }
                    Ok(story) => break story,
                    Err(e) => {
                        log::error!("Generation failed: {:?}", e);
                        eprintln!("Error: {}", e);
                    }
                }
            }
            Err(e) => eprintln!("Error: {}", e),
        }

        if !inquire::Confirm::new("Try again?").with_default(true).prompt()? {
            return Ok(Next::Quit);
        }
    };

    let mut viewer = BookViewer::new(&story);
    loop {
        match prompt_action(&mut viewer)? {
            ViewerAction::Export => match exporter.export(&story).await {
                Ok(key) => println!("Book exported to {}/{}", config.output_folder, key),
                Err(e) => eprintln!("Export failed: {:#}", e),
            },
            ViewerAction::NewStory => return Ok(Next::NewStory),
            ViewerAction::Logout => return Ok(Next::Logout),
            ViewerAction::Quit => return Ok(Next::Quit),
            ViewerAction::Next | ViewerAction::Previous => {}
        }
    }
}
