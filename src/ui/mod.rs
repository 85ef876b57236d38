use crate::core::story::Story;
use crate::utils::image::display_reference;
use anyhow::Result;
use inquire::Select;
use std::fmt;

/// Read-only pager over a finished story.
pub struct BookViewer<'a> {
    story: &'a Story,
    current: usize,
}

impl<'a> BookViewer<'a> {
    pub fn new(story: &'a Story) -> Self {
        Self { story, current: 0 }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn page_count(&self) -> usize {
        self.story.pages.len()
    }

    pub fn has_next(&self) -> bool {
        self.current + 1 < self.page_count()
    }

    pub fn has_previous(&self) -> bool {
        self.current > 0
    }

    pub fn next(&mut self) {
        if self.has_next() {
            self.current += 1;
        }
    }

    pub fn previous(&mut self) {
        if self.has_previous() {
            self.current -= 1;
        }
    }

    pub fn render_page(&self) -> String {
        let Some(page) = self.story.pages.get(self.current) else {
            return format!("{}\n\n(This story has no pages.)", self.story.title());
        };
        format!(
            "{}\n\n[Illustration: {}]\n\n{}\n\nPage {} of {}",
            self.story.title(),
            display_reference(&page.image_reference, 80),
            page.content,
            self.current + 1,
            self.page_count()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerAction {
    Next,
    Previous,
    Export,
    NewStory,
    Logout,
    Quit,
}

impl fmt::Display for ViewerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ViewerAction::Next => "Next page",
            ViewerAction::Previous => "Previous page",
            ViewerAction::Export => "Export book",
            ViewerAction::NewStory => "Create new story",
            ViewerAction::Logout => "Log out",
            ViewerAction::Quit => "Quit",
        };
        f.write_str(label)
    }
}

/// Shows the current page and asks for the next action. Navigation is
/// handled here; every other action is returned to the caller.
pub fn prompt_action(viewer: &mut BookViewer<'_>) -> Result<ViewerAction> {
    loop {
        println!("\n{}\n", viewer.render_page());

        let mut options = Vec::new();
        if viewer.has_next() {
            options.push(ViewerAction::Next);
        }
        if viewer.has_previous() {
            options.push(ViewerAction::Previous);
        }
        options.extend([
            ViewerAction::Export,
            ViewerAction::NewStory,
            ViewerAction::Logout,
            ViewerAction::Quit,
        ]);

        match Select::new("What next?", options).prompt()? {
            ViewerAction::Next => viewer.next(),
            ViewerAction::Previous => viewer.previous(),
            other => return Ok(other),
        }
    }
}
