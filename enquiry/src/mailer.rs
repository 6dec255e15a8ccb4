//! Mail-merge of `.docx` templates from spreadsheet rows.
//!
//! A template carries `{{ column }}` placeholders in its body, headers and
//! footers. Word frequently splits a placeholder over several runs, even
//! between the two braces of `{{` or `}}`. Markup inside a placeholder is
//! dropped and the runs merge into one.

use crate::errors::EnquiryError;
use crate::table::Table;
use indexmap::IndexMap;
use regex::Regex;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const PLACEHOLDER: &str = r"(?s)\{\{(.*?)\}\}";
const XML_TAG: &str = r"<[^>]*>";
const SPLIT_OPEN: &str = r"\{(?:<[^>]*>)+\{";
const SPLIT_CLOSE: &str = r"\}(?:<[^>]*>)+\}";

#[derive(Debug, Clone)]
pub struct MailOptions {
    pub file_prefix: String,
    /// Column whose value names each generated file
    pub name_column: String,
}

impl Default for MailOptions {
    fn default() -> Self {
        Self {
            file_prefix: "Surat".to_string(),
            name_column: "Nama_Nasabah".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MergeReport {
    pub count: usize,
    pub output_dir: PathBuf,
    pub files: Vec<PathBuf>,
}

impl MergeReport {
    pub fn summary(&self) -> String {
        format!(
            "{} letters generated in folder: {}",
            self.count,
            self.output_dir.display()
        )
    }
}

/// One letter per row of the spreadsheet at `rows_path`.
#[instrument(skip_all, fields(rows = %rows_path.as_ref().display()))]
pub fn generate_letters(
    rows_path: impl AsRef<Path>,
    template: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    options: &MailOptions,
) -> Result<MergeReport, EnquiryError> {
    let table = Table::read(rows_path.as_ref())?;
    generate_letters_from_table(&table, template, output_dir, options)
}

pub fn generate_letters_from_table(
    table: &Table,
    template: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    options: &MailOptions,
) -> Result<MergeReport, EnquiryError> {
    let template_bytes = std::fs::read(template.as_ref())?;
    let renderer = TemplateRenderer::new()?;
    let output_dir = output_dir.as_ref();
    std::fs::create_dir_all(output_dir)?;

    let mut files = Vec::with_capacity(table.len());
    for (index, record) in table.records().into_iter().enumerate() {
        let record: IndexMap<String, String> = record
            .into_iter()
            .map(|(k, v)| (k.replace(' ', "_"), v))
            .collect();
        let name = record
            .get(&options.name_column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .unwrap_or("User");
        let filename = format!(
            "{}_{}_{}.docx",
            options.file_prefix,
            sanitize_file_name(name),
            index + 1
        );
        let path = output_dir.join(filename);
        renderer.render_docx(&template_bytes, &record, &path)?;
        debug!("Generated {}", path.display());
        files.push(path);
    }

    let report = MergeReport {
        count: files.len(),
        output_dir: output_dir.to_path_buf(),
        files,
    };
    info!("{}", report.summary());
    Ok(report)
}

fn is_rendered_part(name: &str) -> bool {
    name == "word/document.xml"
        || ((name.starts_with("word/header") || name.starts_with("word/footer"))
            && name.ends_with(".xml"))
}

/// Placeholder patterns, compiled once and shared by every letter of a merge.
pub struct TemplateRenderer {
    placeholder: Regex,
    tag: Regex,
    split_open: Regex,
    split_close: Regex,
}

impl TemplateRenderer {
    pub fn new() -> Result<Self, EnquiryError> {
        let compile =
            |pattern: &str| Regex::new(pattern).map_err(|e| EnquiryError::Document(e.to_string()));
        Ok(Self {
            placeholder: compile(PLACEHOLDER)?,
            tag: compile(XML_TAG)?,
            split_open: compile(SPLIT_OPEN)?,
            split_close: compile(SPLIT_CLOSE)?,
        })
    }

    /// Writes a copy of the template at `output` with every placeholder filled.
    pub fn render_docx(
        &self,
        template: &[u8],
        values: &IndexMap<String, String>,
        output: &Path,
    ) -> Result<(), EnquiryError> {
        let mut archive = ZipArchive::new(Cursor::new(template))?;
        let mut writer = ZipWriter::new(std::fs::File::create(output)?);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for i in 0..archive.len() {
            let name = archive.by_index_raw(i)?.name().to_string();
            if !is_rendered_part(&name) {
                writer.raw_copy_file(archive.by_index_raw(i)?)?;
                continue;
            }
            let mut xml = String::new();
            archive
                .by_index(i)?
                .read_to_string(&mut xml)
                .map_err(|e| EnquiryError::Document(format!("{name} is not valid UTF-8 XML: {e}")))?;
            writer.start_file(name, options)?;
            writer.write_all(self.render_xml(&xml, values).as_bytes())?;
        }
        writer.finish()?;
        Ok(())
    }

    /// Replaces each `{{ name }}` in a WordprocessingML part; unknown names render empty.
    pub fn render_xml(&self, xml: &str, values: &IndexMap<String, String>) -> String {
        let xml = self.split_open.replace_all(xml, "{{");
        let xml = self.split_close.replace_all(&xml, "}}");
        self.placeholder
            .replace_all(&xml, |caps: &regex::Captures| {
                let inner = self.tag.replace_all(&caps[1], "");
                let value = values.get(inner.trim()).map(String::as_str).unwrap_or("");
                escape_xml(value)
            })
            .into_owned()
    }
}

fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

pub(crate) fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}
