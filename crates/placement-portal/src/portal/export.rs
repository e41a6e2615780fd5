//! Profile export to a portable single-page document.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use mime::Mime;

use super::domain::Student;

const PAGE_WIDTH: i64 = 612;
const PAGE_HEIGHT: i64 = 792;
const MARGIN: i64 = 72;
const TITLE_SIZE: i64 = 18;
const BODY_SIZE: i64 = 11;
const LEADING: i64 = 15;
const WRAP_COLUMNS: usize = 90;
const TRUNCATED: &str = "[...]";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("render failed: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("render failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Format-neutral view of a profile: a title and labelled fields in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileDocument {
    pub title: String,
    pub fields: Vec<(&'static str, String)>,
}

impl ProfileDocument {
    pub fn from_student(student: &Student) -> Self {
        let profile = &student.profile;
        let optional = [
            ("Phone", &profile.phone),
            ("City", &profile.city),
            ("State", &profile.state),
            ("Country", &profile.country),
            ("University", &profile.university),
            ("Degree", &profile.degree),
            ("Graduation year", &profile.graduation_year),
            ("Job preference", &profile.job_preference),
        ];

        let mut fields = vec![("Email", student.email.clone())];
        fields.extend(
            optional
                .into_iter()
                .filter_map(|(label, value)| value.clone().map(|value| (label, value))),
        );
        if !profile.skills.is_empty() {
            fields.push(("Skills", profile.skills.join(", ")));
        }
        if let Some(bio) = &profile.bio {
            fields.push(("Bio", bio.clone()));
        }
        if let Some(resume) = &profile.resume {
            fields.push(("Resume", resume.clone()));
        }

        Self {
            title: profile.name.clone(),
            fields,
        }
    }
}

/// Output of an export: bytes plus what a client needs to save them.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub filename: String,
    pub content_type: Mime,
    pub bytes: Vec<u8>,
}

pub trait DocumentRenderer: Send + Sync {
    fn content_type(&self) -> Mime;
    fn extension(&self) -> &'static str;
    fn render(&self, document: &ProfileDocument) -> Result<Vec<u8>, ExportError>;
}

/// One Helvetica page in WinAnsi encoding, one text object per line.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfRenderer;

impl DocumentRenderer for PdfRenderer {
    fn content_type(&self) -> Mime {
        mime::APPLICATION_PDF
    }

    fn extension(&self) -> &'static str {
        "pdf"
    }

    fn render(&self, document: &ProfileDocument) -> Result<Vec<u8>, ExportError> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = page_content(document).encode()?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)?;
        Ok(bytes)
    }
}

fn page_content(document: &ProfileDocument) -> Content {
    let max_lines = ((PAGE_HEIGHT - 2 * MARGIN - TITLE_SIZE) / LEADING) as usize;
    let mut lines = Vec::new();
    for (label, value) in &document.fields {
        lines.extend(wrap(&format!("{label}: {value}"), WRAP_COLUMNS));
    }
    if lines.len() > max_lines {
        lines.truncate(max_lines - 1);
        lines.push(TRUNCATED.to_string());
    }

    let title_y = PAGE_HEIGHT - MARGIN;
    let mut operations = text_line(&document.title, TITLE_SIZE, title_y);
    let mut y = title_y - LEADING - 6;
    for line in &lines {
        operations.extend(text_line(line, BODY_SIZE, y));
        y -= LEADING;
    }
    Content { operations }
}

fn text_line(text: &str, size: i64, y: i64) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), size.into()]),
        Operation::new("Td", vec![MARGIN.into(), y.into()]),
        Operation::new(
            "Tj",
            vec![Object::String(win_ansi(text), StringFormat::Literal)],
        ),
        Operation::new("ET", vec![]),
    ]
}

/// Greedy word wrap; words longer than a line are split.
fn wrap(text: &str, columns: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > columns {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            lines.push(word.drain(..columns).collect());
        }
        let word: String = word.into_iter().collect();
        let needed = if current.is_empty() { 0 } else { 1 } + word.chars().count();
        if current.chars().count() + needed > columns {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Encodes text for the WinAnsi base font; characters it cannot show become `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| match ch {
            ' '..='~' | '\u{a0}'..='\u{ff}' => ch as u8,
            '\u{20ac}' => 0x80,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201c}' => 0x93,
            '\u{201d}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            _ => b'?',
        })
        .collect()
}
