//! Per-clip text templates for `search --format`.
//!
//! A template is literal text with `{{ ... }}` actions. An action is a
//! pipeline of commands separated by `|`: a field such as `.Text`, a quoted
//! string, or a function applied to arguments. Each stage's result is passed
//! as the last argument of the next stage.
//!
//! Fields are matched case-insensitively with underscores ignored, so
//! `.BlobPath` and `.blob_path` name the same field.
//!
//! | Function | Result |
//! |----------|--------|
//! | `simplify s` | `s` with runs of whitespace collapsed to one space |
//! | `fallback a b ...` | the first non-empty argument |
//!
//! ```text
//! {{.ID}}: {{fallback .Text .BlobPath .Metadata | simplify}}
//! ```

use crate::models::Clip;
use crate::{Error, Result};
use regex::Regex;
use std::sync::LazyLock;

/// `{{ action }}`, spanning lines.
static ACTION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{\{(.*?)\}\}").unwrap_or_else(|_| unreachable!()));

/// Quoted string, pipe, bare word, or a stray quote.
static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""((?:[^"\\]|\\.)*)"|(\|)|([^\s|"]+)|(")"#).unwrap_or_else(|_| unreachable!())
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Id,
    Time,
    Mime,
    Hash,
    Text,
    BlobPath,
    Metadata,
    Url,
}

impl Field {
    fn parse(name: &str) -> Result<Self> {
        let key: String = name
            .chars()
            .filter(|c| *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "id" => Ok(Self::Id),
            "time" | "capturedat" => Ok(Self::Time),
            "mime" => Ok(Self::Mime),
            "hash" => Ok(Self::Hash),
            "text" => Ok(Self::Text),
            "blobpath" | "blob" | "path" => Ok(Self::BlobPath),
            "metadata" => Ok(Self::Metadata),
            "url" => Ok(Self::Url),
            _ => Err(invalid(format!("unknown field '.{name}'"))),
        }
    }

    fn value(self, clip: &Clip) -> String {
        match self {
            Self::Id => clip.id.to_string(),
            Self::Time => clip.captured_at.to_rfc3339(),
            Self::Mime => clip.mime.clone(),
            Self::Hash => clip.hash.to_string(),
            Self::Text => clip.text().unwrap_or_default().to_string(),
            Self::BlobPath => clip
                .blob()
                .map(|blob| blob.path.display().to_string())
                .unwrap_or_default(),
            Self::Metadata => clip.metadata.clone().unwrap_or_default(),
            Self::Url => clip.url.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    Simplify,
    Fallback,
}

impl Function {
    fn parse(name: &str) -> Result<Self> {
        match name {
            "simplify" => Ok(Self::Simplify),
            "fallback" => Ok(Self::Fallback),
            _ => Err(invalid(format!("unknown function '{name}'"))),
        }
    }

    const fn accepts(self, count: usize) -> bool {
        match self {
            Self::Simplify => count == 1,
            Self::Fallback => count >= 1,
        }
    }

    fn apply(self, args: Vec<String>) -> String {
        match self {
            Self::Simplify => args
                .iter()
                .flat_map(|arg| arg.split_whitespace())
                .collect::<Vec<_>>()
                .join(" "),
            Self::Fallback => args.into_iter().find(|arg| !arg.is_empty()).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Arg {
    Field(Field),
    Literal(String),
}

impl Arg {
    fn value(&self, clip: &Clip) -> String {
        match self {
            Self::Field(field) => field.value(clip),
            Self::Literal(text) => text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Value(Arg),
    Call(Function, Vec<Arg>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Pipeline(Vec<Command>),
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
    Quoted(String),
    Pipe,
    Word(String),
}

fn invalid(message: String) -> Error {
    Error::InvalidInput(format!("template: {message}"))
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn tokenize(action: &str) -> Result<Vec<Token>> {
    TOKEN_PATTERN
        .captures_iter(action)
        .map(|caps| {
            if let Some(quoted) = caps.get(1) {
                Ok(Token::Quoted(unescape(quoted.as_str())))
            } else if caps.get(2).is_some() {
                Ok(Token::Pipe)
            } else if let Some(word) = caps.get(3) {
                Ok(Token::Word(word.as_str().to_string()))
            } else {
                Err(invalid(format!("unterminated string in '{{{{{action}}}}}'")))
            }
        })
        .collect()
}

fn parse_arg(token: Token) -> Result<Arg> {
    match token {
        Token::Quoted(text) => Ok(Arg::Literal(text)),
        Token::Word(word) => match word.strip_prefix('.') {
            Some(name) => Field::parse(name).map(Arg::Field),
            None => Err(invalid(format!("'{word}' is not a field; fields start with '.'"))),
        },
        Token::Pipe => Err(invalid("unexpected '|'".to_string())),
    }
}

fn parse_command(tokens: Vec<Token>, piped: bool) -> Result<Command> {
    let mut tokens = tokens.into_iter();
    let Some(head) = tokens.next() else {
        return Err(invalid("empty command".to_string()));
    };

    if let Token::Word(word) = &head
        && !word.starts_with('.')
    {
        let function = Function::parse(word)?;
        let args = tokens.map(parse_arg).collect::<Result<Vec<_>>>()?;
        let count = args.len() + usize::from(piped);
        if !function.accepts(count) {
            return Err(invalid(format!("wrong number of arguments to '{word}'")));
        }
        return Ok(Command::Call(function, args));
    }

    if piped {
        return Err(invalid("only functions may follow '|'".to_string()));
    }
    let arg = parse_arg(head)?;
    if tokens.next().is_some() {
        return Err(invalid("a value takes no arguments".to_string()));
    }
    Ok(Command::Value(arg))
}

fn parse_pipeline(action: &str) -> Result<Vec<Command>> {
    let mut stages: Vec<Vec<Token>> = vec![Vec::new()];
    for token in tokenize(action)? {
        match token {
            Token::Pipe => stages.push(Vec::new()),
            other => {
                if let Some(stage) = stages.last_mut() {
                    stage.push(other);
                }
            },
        }
    }
    stages
        .into_iter()
        .enumerate()
        .map(|(index, stage)| parse_command(stage, index > 0))
        .collect()
}

fn push_literal(segments: &mut Vec<Segment>, text: &str) -> Result<()> {
    if text.contains("{{") {
        return Err(invalid("unclosed action".to_string()));
    }
    if !text.is_empty() {
        segments.push(Segment::Literal(text.to_string()));
    }
    Ok(())
}

/// A compiled clip template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl ClipTemplate {
    /// Compiles `source`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for unclosed actions, unknown fields
    /// or functions, and calls with the wrong number of arguments.
    pub fn parse(source: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut rest = 0;
        for caps in ACTION_PATTERN.captures_iter(source) {
            let (Some(whole), Some(action)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            push_literal(&mut segments, &source[rest..whole.start()])?;
            segments.push(Segment::Pipeline(parse_pipeline(action.as_str())?));
            rest = whole.end();
        }
        push_literal(&mut segments, &source[rest..])?;

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// The template text as given.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Renders the template for one clip.
    #[must_use]
    pub fn render(&self, clip: &Clip) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Pipeline(commands) => out.push_str(&run_pipeline(commands, clip)),
            }
        }
        out
    }
}

fn run_pipeline(commands: &[Command], clip: &Clip) -> String {
    let mut piped: Option<String> = None;
    for command in commands {
        let value = match command {
            Command::Value(arg) => arg.value(clip),
            Command::Call(function, args) => {
                let mut values: Vec<String> = args.iter().map(|arg| arg.value(clip)).collect();
                values.extend(piped.take());
                function.apply(values)
            },
        };
        piped = Some(value);
    }
    piped.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BlobRef, ClipId, ClipPayload, ContentHash};
    use chrono::Utc;
    use std::path::PathBuf;
    use test_case::test_case;

    fn text_clip(text: &str) -> Clip {
        Clip {
            id: ClipId::new(7),
            captured_at: Utc::now(),
            hash: ContentHash::new(0xab),
            mime: "text/plain".to_string(),
            payload: ClipPayload::Text(text.to_string()),
            metadata: None,
            url: Some("https://example.org".to_string()),
        }
    }

    fn image_clip() -> Clip {
        Clip {
            id: ClipId::new(8),
            captured_at: Utc::now(),
            hash: ContentHash::new(0xcd),
            mime: "image/png".to_string(),
            payload: ClipPayload::Blob(BlobRef {
                hash: ContentHash::new(0xcd),
                path: PathBuf::from("/blobs/cd"),
            }),
            metadata: Some("a cat".to_string()),
            url: None,
        }
    }

    #[test_case("{{.ID}}: {{.Text}}", "7: hello  world"; "go style fields")]
    #[test_case("{{.blob_path}}|{{.url}}", "|https://example.org"; "snake case fields")]
    #[test_case("{{ simplify .Text }}", "hello world"; "simplify")]
    #[test_case("{{ .Text | simplify }}", "hello world"; "piped simplify")]
    #[test_case("{{ fallback .Metadata .Url }}", "https://example.org"; "fallback skips empty")]
    #[test_case(r#"{{ fallback .Metadata "none" }}"#, "none"; "fallback literal")]
    #[test_case("{{.Mime}}\t{{.Hash}}", "text/plain\t00000000000000ab"; "mime and hash")]
    fn test_render_text_clip(template: &str, expected: &str) {
        let template = ClipTemplate::parse(template).unwrap();
        assert_eq!(template.render(&text_clip("hello  world")), expected);
    }

    #[test]
    fn test_fallback_pipeline_on_image() {
        let template = ClipTemplate::parse("{{.ID}}: {{fallback .Text .BlobPath .Metadata | simplify}}").unwrap();
        assert_eq!(template.render(&image_clip()), "8: /blobs/cd");
    }

    #[test]
    fn test_literal_only_template() {
        let template = ClipTemplate::parse("yaml").unwrap();
        assert_eq!(template.render(&text_clip("x")), "yaml");
        assert_eq!(template.source(), "yaml");
    }

    #[test_case("{{.Text"; "unclosed action")]
    #[test_case("{{.Nope}}"; "unknown field")]
    #[test_case("{{upper .Text}}"; "unknown function")]
    #[test_case("{{ id }}"; "field without dot")]
    #[test_case("{{simplify .Text .Url}}"; "simplify arity")]
    #[test_case("{{fallback}}"; "fallback arity")]
    #[test_case("{{.Text | .Url}}"; "value after pipe")]
    #[test_case("{{.Text .Url}}"; "value with arguments")]
    #[test_case(r#"{{fallback .Text "open}}"#; "unterminated string")]
    #[test_case("{{}}"; "empty action")]
    fn test_invalid_template_rejected(template: &str) {
        assert!(matches!(ClipTemplate::parse(template), Err(Error::InvalidInput(_))));
    }
}
