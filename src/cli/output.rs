//! Rendering clips for the terminal.

use super::template::ClipTemplate;
use crate::Error;
use crate::models::Clip;
use std::io::{self, Write};
use std::str::FromStr;

/// Output format for commands that print clips.
///
/// Any string other than the named formats is compiled as a [`ClipTemplate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// `id<TAB>mime<TAB>preview`, one clip per line (default).
    #[default]
    Simple,
    /// One pretty-printed JSON array.
    Json,
    /// One compact JSON object per line.
    JsonStream,
    /// One rendered template per clip.
    Template(ClipTemplate),
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "json" => Ok(Self::Json),
            "json-stream" | "jsonl" => Ok(Self::JsonStream),
            _ => ClipTemplate::parse(s).map(Self::Template),
        }
    }
}

/// Writes clips as tab-separated preview lines.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_simple<W: Write>(writer: &mut W, clips: &[Clip]) -> io::Result<()> {
    for clip in clips {
        writeln!(writer, "{}\t{}\t{}", clip.id, clip.mime, clip.preview())?;
    }
    Ok(())
}

/// Writes clips as one JSON array.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_json<W: Write>(writer: &mut W, clips: &[Clip]) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *writer, clips)?;
    writeln!(writer)?;
    Ok(())
}

/// Writes clips as newline-delimited JSON.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_json_stream<W: Write>(writer: &mut W, clips: &[Clip]) -> anyhow::Result<()> {
    for clip in clips {
        serde_json::to_writer(&mut *writer, clip)?;
        writeln!(writer)?;
    }
    Ok(())
}

/// Writes each clip through `template`, ending every rendering with a newline
/// unless the template already produced one.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_template<W: Write>(
    writer: &mut W,
    clips: &[Clip],
    template: &ClipTemplate,
) -> io::Result<()> {
    for clip in clips {
        let rendered = template.render(clip);
        writer.write_all(rendered.as_bytes())?;
        if !rendered.ends_with('\n') {
            writeln!(writer)?;
        }
    }
    Ok(())
}

/// Writes clips in the requested format.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_clips<W: Write>(
    writer: &mut W,
    clips: &[Clip],
    format: &OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Simple => write_simple(writer, clips)?,
        OutputFormat::Json => write_json(writer, clips)?,
        OutputFormat::JsonStream => write_json_stream(writer, clips)?,
        OutputFormat::Template(template) => write_template(writer, clips, template)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClipId, ClipPayload, ContentHash};
    use chrono::Utc;
    use test_case::test_case;

    fn clips() -> Vec<Clip> {
        ["first\nline", "second"]
            .into_iter()
            .zip(1..)
            .map(|(text, id)| Clip {
                id: ClipId::new(id),
                captured_at: Utc::now(),
                hash: ContentHash::new(id.cast_unsigned()),
                mime: "text/plain".to_string(),
                payload: ClipPayload::Text(text.to_string()),
                metadata: None,
                url: None,
            })
            .collect()
    }

    #[test_case("simple", OutputFormat::Simple; "simple")]
    #[test_case("JSON", OutputFormat::Json; "json uppercase")]
    #[test_case("json-stream", OutputFormat::JsonStream; "json stream")]
    #[test_case("jsonl", OutputFormat::JsonStream; "jsonl alias")]
    fn test_output_format_from_str(input: &str, expected: OutputFormat) {
        assert_eq!(input.parse::<OutputFormat>().unwrap(), expected);
    }

    #[test]
    fn test_other_strings_are_templates() {
        let format = "{{.ID}}: {{.Text}}".parse::<OutputFormat>().unwrap();
        assert!(matches!(&format, OutputFormat::Template(t) if t.source() == "{{.ID}}: {{.Text}}"));

        let mut out = Vec::new();
        write_clips(&mut out, &clips(), &format).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "1: first\nline\n2: second\n");
    }

    #[test]
    fn test_template_newline_not_doubled() {
        let format = "{{.ID | simplify}}\n".parse::<OutputFormat>().unwrap();
        let mut out = Vec::new();
        write_clips(&mut out, &clips(), &format).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "1\n2\n");
    }

    #[test]
    fn test_broken_template_rejected() {
        assert!(matches!(
            "{{.Nope}}".parse::<OutputFormat>(),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_simple_output() {
        let mut out = Vec::new();
        write_clips(&mut out, &clips(), &OutputFormat::Simple).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "1\ttext/plain\tfirst line\n2\ttext/plain\tsecond\n"
        );
    }

    #[test]
    fn test_json_stream_one_object_per_line() {
        let mut out = Vec::new();
        write_clips(&mut out, &clips(), &OutputFormat::JsonStream).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["text"], "second");
    }

    #[test]
    fn test_json_is_array() {
        let mut out = Vec::new();
        write_clips(&mut out, &clips(), &OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value.as_array().map(Vec::len), Some(2));
        assert_eq!(value[0]["id"], 1);
    }
}
