use crate::core::io::Storage;
use crate::core::story::Story;
use crate::services::llm::http_client;
use crate::utils::image::{decode_data_uri, is_data_uri};
use anyhow::{anyhow, bail, Context, Result};
use image::{DynamicImage, GenericImageView};
use printpdf::{BuiltinFont, Color, Image, ImageTransform, Mm, PdfDocument, Rgb};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

// A4 portrait, in millimetres
const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;
const IMAGE_HEIGHT: f32 = (PAGE_HEIGHT - 2.0 * MARGIN) * 0.6;

const PT_TO_MM: f32 = 0.3528;
// Average Helvetica glyph width as a fraction of the font size
const GLYPH_WIDTH: f32 = 0.5;
const IMAGE_DPI: f32 = 300.0;

/// Writes a finished story as an A4 PDF book: a title page, an optional
/// generation details page, then one page per story page with its
/// illustration embedded. A page whose image cannot be loaded gets an
/// error notice and its text; the rest of the book is still exported.
pub struct BookExporter {
    storage: Arc<dyn Storage>,
    client: reqwest::Client,
    include_prompts: bool,
}

impl BookExporter {
    pub fn new(storage: Arc<dyn Storage>, timeout: Duration) -> Self {
        Self {
            storage,
            client: http_client(timeout),
            include_prompts: true,
        }
    }

    pub fn with_prompts(mut self, include: bool) -> Self {
        self.include_prompts = include;
        self
    }

    /// Returns the storage key of the written document.
    pub async fn export(&self, story: &Story) -> Result<String> {
        let key = format!("{}.pdf", file_stem(&story.source_request.child_name));

        let images = self.load_images(story).await;
        let failed_images = images.iter().filter(|image| image.is_err()).count();
        let layout = layout_book(story, images, self.include_prompts);
        let bytes = render_pdf(&story.title(), &layout)?;

        self.storage.write(&key, &bytes).await?;
        log::info!(
            "Exported {} pages to {} ({} without images)",
            story.pages.len(),
            key,
            failed_images
        );
        Ok(key)
    }

    async fn load_images(&self, story: &Story) -> Vec<Result<DynamicImage>> {
        let mut images = Vec::with_capacity(story.pages.len());
        for (i, page) in story.pages.iter().enumerate() {
            let image = self.load_image(&page.image_reference).await;
            if let Err(e) = &image {
                log::warn!("Page {}: could not load image: {:#}", i + 1, e);
            }
            images.push(image);
        }
        images
    }

    async fn load_image(&self, reference: &str) -> Result<DynamicImage> {
        let bytes = self.fetch_image_bytes(reference).await?;
        let image = image::load_from_memory(&bytes).context("Unsupported image data")?;
        if image.width() == 0 || image.height() == 0 {
            bail!("Image has no pixels");
        }
        // Flatten alpha, the PDF image is embedded as plain RGB
        Ok(DynamicImage::ImageRgb8(image.to_rgb8()))
    }

    async fn fetch_image_bytes(&self, reference: &str) -> Result<Vec<u8>> {
        if is_data_uri(reference) {
            let (_mime, bytes) = decode_data_uri(reference)?;
            return Ok(bytes);
        }

        let url = Url::parse(reference).with_context(|| format!("Invalid image reference: {}", reference))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("Unsupported image reference scheme: {}", url.scheme());
        }

        let resp = self
            .client
            .get(url.as_str())
            .send()
            .await
            .context("Image download failed")?;
        if !resp.status().is_success() {
            return Err(anyhow!("Image download failed: HTTP {}", resp.status()));
        }
        let bytes = resp.bytes().await.context("Image download failed")?;
        Ok(bytes.to_vec())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Ink {
    Black,
    Red,
}

/// Positions are in millimetres from the top-left corner of the page.
enum Element {
    Text {
        text: String,
        size: f32,
        x: f32,
        y: f32,
        ink: Ink,
    },
    Image {
        image: DynamicImage,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

#[derive(Default)]
struct LayoutPage {
    elements: Vec<Element>,
}

#[derive(Default)]
struct Layout {
    pages: Vec<LayoutPage>,
}

impl Layout {
    fn new_page(&mut self) {
        self.pages.push(LayoutPage::default());
    }

    fn push(&mut self, element: Element) {
        if self.pages.is_empty() {
            self.new_page();
        }
        if let Some(page) = self.pages.last_mut() {
            page.elements.push(element);
        }
    }

    fn text(&mut self, text: impl Into<String>, size: f32, x: f32, y: f32, ink: Ink) {
        self.push(Element::Text {
            text: text.into(),
            size,
            x,
            y,
            ink,
        });
    }

    fn centered(&mut self, text: impl Into<String>, size: f32, y: f32) {
        let text = text.into();
        let x = ((PAGE_WIDTH - text_width(&text, size)) / 2.0).max(MARGIN);
        self.text(text, size, x, y, Ink::Black);
    }

    /// Writes `text` wrapped to the content width with its first baseline at
    /// `y`, continuing on a new page past the bottom margin. Returns the
    /// baseline after the last line.
    fn paragraph(&mut self, text: &str, size: f32, mut y: f32) -> f32 {
        let step = line_height(size);
        for line in wrap_text(text, size, CONTENT_WIDTH) {
            if y > PAGE_HEIGHT - MARGIN {
                self.new_page();
                y = MARGIN + step;
            }
            self.text(line, size, MARGIN, y, Ink::Black);
            y += step;
        }
        y
    }
}

fn line_height(size: f32) -> f32 {
    size * PT_TO_MM * 1.5
}

fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * PT_TO_MM * GLYPH_WIDTH
}

/// Greedy word wrap using the average glyph width. Words longer than a line
/// are split.
fn wrap_text(text: &str, size: f32, width: f32) -> Vec<String> {
    let max_chars = ((width / (size * PT_TO_MM * GLYPH_WIDTH)) as usize).max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > max_chars {
                if !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                }
                lines.push(word.drain(..max_chars).collect());
            }
            let word: String = word.into_iter().collect();
            if word.is_empty() {
                continue;
            }
            let needed = if line.is_empty() { 0 } else { line.chars().count() + 1 };
            if needed + word.chars().count() > max_chars {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(&word);
        }
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines
}

fn layout_book(story: &Story, images: Vec<Result<DynamicImage>>, include_prompts: bool) -> Layout {
    let request = &story.source_request;
    let mut layout = Layout::default();

    layout.new_page();
    layout.centered(story.title(), 24.0, 40.0);
    layout.centered(format!("Age: {}", request.age), 16.0, 60.0);
    layout.centered(format!("Theme: {}", request.theme), 16.0, 70.0);
    layout.centered(format!("Interests: {}", request.interests.join(", ")), 16.0, 80.0);

    if include_prompts && !story.story_prompt.is_empty() {
        layout.new_page();
        layout.text("Story Generation Details", 14.0, MARGIN, MARGIN + 10.0, Ink::Black);
        layout.text("System Prompt:", 12.0, MARGIN, MARGIN + 20.0, Ink::Black);
        layout.paragraph(&story.story_prompt, 12.0, MARGIN + 30.0);
    }

    let mut images = images.into_iter();
    for (i, page) in story.pages.iter().enumerate() {
        layout.new_page();
        layout.centered(format!("Page {}", i + 1), 10.0, PAGE_HEIGHT - 10.0);

        let text_y = match images.next() {
            Some(Ok(image)) => {
                let aspect = image.width() as f32 / image.height() as f32;
                let width = CONTENT_WIDTH.min(IMAGE_HEIGHT * aspect);
                let height = width / aspect;
                layout.push(Element::Image {
                    image,
                    x: MARGIN + (CONTENT_WIDTH - width) / 2.0,
                    y: MARGIN,
                    width,
                    height,
                });
                MARGIN + height + 10.0
            }
            _ => {
                layout.text("Error loading image", 12.0, MARGIN, MARGIN + 20.0, Ink::Red);
                MARGIN + 40.0
            }
        };

        let mut y = layout.paragraph(&page.content, 12.0, text_y);

        if include_prompts {
            for (label, prompt) in [
                ("Text Prompt:", &page.text_prompt),
                ("Image Prompt:", &page.image_prompt),
            ] {
                if let Some(prompt) = prompt {
                    y += 4.0;
                    layout.text(label, 8.0, MARGIN, y, Ink::Black);
                    y = layout.paragraph(prompt, 8.0, y + line_height(8.0));
                }
            }
        }
    }

    layout
}

fn render_pdf(title: &str, layout: &Layout) -> Result<Vec<u8>> {
    let (doc, first_page, first_layer) =
        PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| anyhow!("Failed to load PDF font: {:?}", e))?;

    for (i, page) in layout.pages.iter().enumerate() {
        let (page_index, layer_index) = if i == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1")
        };
        let layer = doc.get_page(page_index).get_layer(layer_index);

        for element in &page.elements {
            match element {
                Element::Text {
                    text,
                    size,
                    x,
                    y,
                    ink,
                } => {
                    let (r, g, b) = match ink {
                        Ink::Black => (0.0, 0.0, 0.0),
                        Ink::Red => (1.0, 0.0, 0.0),
                    };
                    layer.set_fill_color(Color::Rgb(Rgb::new(r, g, b, None)));
                    layer.use_text(text.as_str(), *size, Mm(*x), Mm(PAGE_HEIGHT - *y), &font);
                }
                Element::Image {
                    image,
                    x,
                    y,
                    width,
                    height,
                } => {
                    let natural_width = image.width() as f32 * 25.4 / IMAGE_DPI;
                    let natural_height = image.height() as f32 * 25.4 / IMAGE_DPI;
                    Image::from_dynamic_image(image).add_to_layer(
                        layer.clone(),
                        ImageTransform {
                            translate_x: Some(Mm(*x)),
                            translate_y: Some(Mm(PAGE_HEIGHT - *y - *height)),
                            scale_x: Some(*width / natural_width),
                            scale_y: Some(*height / natural_height),
                            dpi: Some(IMAGE_DPI),
                            ..Default::default()
                        },
                    );
                }
            }
        }
    }

    doc.save_to_bytes()
        .map_err(|e| anyhow!("Failed to write PDF: {:?}", e))
}

fn file_stem(child_name: &str) -> String {
    let name: String = child_name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    if name.is_empty() {
        "story".to_string()
    } else {
        format!("{}_story", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::NativeStorage;
    use crate::core::story::{GenerationRequest, StoryLength, StoryPage};
    use crate::utils::image::png_data_uri;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use httpmock::Method::GET;
    use httpmock::MockServer;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            width,
            height,
            image::Rgb([200, 120, 40]),
        ));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageOutputFormat::Png).unwrap();
        out.into_inner()
    }

    fn png_uri(width: u32, height: u32) -> String {
        png_data_uri(&STANDARD.encode(png_bytes(width, height)))
    }

    fn page(content: &str, image: &str) -> StoryPage {
        StoryPage {
            content: content.to_string(),
            image_reference: image.to_string(),
            text_prompt: Some("Write a story".to_string()),
            image_prompt: Some(format!("Draw: {}", content)),
        }
    }

    fn story(pages: Vec<StoryPage>) -> Story {
        Story {
            pages,
            source_request: GenerationRequest {
                child_name: "Mia Rose".to_string(),
                age: 6,
                interests: vec!["dinosaurs".to_string(), "space".to_string()],
                theme: "friendship".to_string(),
                desired_page_count: 3,
                length: StoryLength::Short,
            },
            story_prompt: "Write a story".to_string(),
        }
    }

    fn exporter(dir: &tempfile::TempDir) -> BookExporter {
        BookExporter::new(Arc::new(NativeStorage::new(dir.path())), Duration::from_secs(5))
    }

    fn texts(page: &LayoutPage) -> Vec<&str> {
        page.elements
            .iter()
            .filter_map(|e| match e {
                Element::Text { text, .. } => Some(text.as_str()),
                Element::Image { .. } => None,
            })
            .collect()
    }

    fn image_count(page: &LayoutPage) -> usize {
        page.elements
            .iter()
            .filter(|e| matches!(e, Element::Image { .. }))
            .count()
    }

    #[tokio::test]
    async fn test_export_writes_pdf() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let storage = Arc::new(NativeStorage::new(temp_dir.path()));
        let exporter = BookExporter::new(storage.clone(), Duration::from_secs(5));

        let story = story(vec![
            page("A dino meets a friend.", &png_uri(4, 2)),
            page("They play together.", &png_uri(3, 3)),
        ]);
        let key = exporter.export(&story).await?;
        assert_eq!(key, "mia_rose_story.pdf");

        let pdf = storage.read(&key).await?;
        assert!(pdf.starts_with(b"%PDF-"));
        Ok(())
    }

    #[tokio::test]
    async fn test_layout_has_title_details_and_story_pages() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let exporter = exporter(&temp_dir);
        let story = story(vec![
            page("A dino meets a friend.", &png_uri(4, 2)),
            page("They play together.", &png_uri(3, 3)),
        ]);

        let layout = layout_book(&story, exporter.load_images(&story).await, true);
        assert_eq!(layout.pages.len(), 4);

        let title = texts(&layout.pages[0]);
        assert_eq!(title[0], "A Story for Mia Rose");
        assert!(title.contains(&"Age: 6"));
        assert!(title.contains(&"Theme: friendship"));
        assert!(title.contains(&"Interests: dinosaurs, space"));

        let details = texts(&layout.pages[1]);
        assert!(details.contains(&"Story Generation Details"));
        assert!(details.contains(&"Write a story"));

        let first = &layout.pages[2];
        assert_eq!(image_count(first), 1);
        let first_texts = texts(first);
        assert!(first_texts.contains(&"Page 1"));
        assert!(first_texts.contains(&"A dino meets a friend."));
        assert!(first_texts.contains(&"Image Prompt:"));
        assert!(first_texts.contains(&"Draw: A dino meets a friend."));
        assert!(!first_texts.contains(&"Error loading image"));
        assert!(texts(&layout.pages[3]).contains(&"Page 2"));

        // A wide image fills the content width and keeps its aspect ratio
        match first.elements.iter().find(|e| matches!(e, Element::Image { .. })) {
            Some(Element::Image { width, height, .. }) => {
                assert!((width - CONTENT_WIDTH).abs() < 0.01);
                assert!((height - CONTENT_WIDTH / 2.0).abs() < 0.01);
            }
            _ => unreachable!(),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_bad_image_falls_back_to_text() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let exporter = exporter(&temp_dir).with_prompts(false);
        let story = story(vec![
            page("Broken picture.", "img://1"),
            page("Not a picture.", &png_data_uri("AAEC")),
            page("Good picture.", &png_uri(2, 2)),
        ]);

        let images = exporter.load_images(&story).await;
        assert!(images[0].is_err());
        assert!(images[1].is_err());
        let layout = layout_book(&story, images, false);

        // No details page without prompts
        assert_eq!(layout.pages.len(), 4);
        let broken = &layout.pages[1];
        assert_eq!(image_count(broken), 0);
        assert!(broken.elements.iter().any(|e| matches!(
            e,
            Element::Text { text, ink: Ink::Red, .. } if text == "Error loading image"
        )));
        let broken_texts = texts(broken);
        assert!(broken_texts.contains(&"Broken picture."));
        assert!(broken_texts.contains(&"Page 1"));
        assert!(!broken_texts.contains(&"Image Prompt:"));
        assert_eq!(image_count(&layout.pages[3]), 1);

        let key = exporter.export(&story).await?;
        assert!(temp_dir.path().join(key).exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_remote_image_is_downloaded() {
        let server = MockServer::start_async().await;
        let png = png_bytes(2, 1);
        server
            .mock_async(|when, then| {
                when.method(GET).path("/dino.png");
                then.status(200).header("content-type", "image/png").body(png);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/missing.png");
                then.status(404);
            })
            .await;

        let temp_dir = tempfile::tempdir().unwrap();
        let exporter = exporter(&temp_dir);
        let image = exporter.load_image(&server.url("/dino.png")).await.unwrap();
        assert_eq!((image.width(), image.height()), (2, 1));

        let err = exporter.load_image(&server.url("/missing.png")).await.unwrap_err();
        assert!(err.to_string().contains("HTTP 404"));
        assert!(exporter.load_image("ftp://example.com/a.png").await.is_err());
    }

    #[test]
    fn test_long_text_wraps_and_flows_to_next_page() {
        let lines = wrap_text("aaaa bbbb cccc", 12.0, 10.5 * 12.0 * PT_TO_MM * GLYPH_WIDTH);
        assert_eq!(lines, vec!["aaaa bbbb", "cccc"]);
        let lines = wrap_text("abcdefghijkl", 12.0, 5.5 * 12.0 * PT_TO_MM * GLYPH_WIDTH);
        assert_eq!(lines, vec!["abcde", "fghij", "kl"]);

        let mut layout = Layout::default();
        layout.new_page();
        let long = "word ".repeat(2000);
        layout.paragraph(&long, 12.0, MARGIN);
        assert!(layout.pages.len() > 1);
        for page in &layout.pages {
            for element in &page.elements {
                if let Element::Text { y, .. } = element {
                    assert!(*y <= PAGE_HEIGHT - MARGIN + line_height(12.0));
                }
            }
        }
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("Mia"), "mia_story");
        assert_eq!(file_stem(" Jo/Ann "), "jo_ann_story");
        assert_eq!(file_stem(""), "story");
    }
}
