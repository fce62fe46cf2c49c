use anyhow::{Context, Result};
use clap::{Parser as _, ValueEnum};
use crossterm::queue;
use crossterm::style::{
    Attribute, Color as TermColor, Print, ResetColor, SetAttribute, SetBackgroundColor,
    SetForegroundColor, SetUnderlineColor,
};
use linetint::config::ThemingConfig;
use linetint::primitives::grammar::{Grammar, LocalGrammarLoader};
use linetint::primitives::parser::Parser;
use linetint::services::{logging, DocumentHighlighter, ThemeRegistry};
use linetint::view::render;
use ratatui::style::Modifier;
use std::io::Write;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Styled text with terminal escape sequences
    Ansi,
    /// One JSON object per line with its tokens and scopes
    Json,
}

/// Highlight a source file with a TextMate grammar and a theme
#[derive(Debug, clap::Parser)]
#[command(name = "linetint", version, about)]
struct Cli {
    /// Grammar file (.json or .tmLanguage); defaults to one matching the file
    #[arg(long)]
    grammar: Option<PathBuf>,

    /// Theme name or theme file; defaults to the configured theme
    #[arg(long)]
    theme: Option<String>,

    /// Configuration file instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Style every line as part of the selection
    #[arg(long)]
    selected: bool,

    #[arg(long, value_enum, default_value_t = Format::Ansi)]
    format: Format,

    /// File to highlight
    file: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ThemingConfig::load(path)?,
        None => ThemingConfig::load_or_default()?,
    };
    logging::init(&config.log_filter);

    let mut parser = Parser::new(config.parser_options());
    parser.load_from(&LocalGrammarLoader::new(config.grammar_dirs.clone()));
    let grammar = match &cli.grammar {
        Some(path) => parser.register(
            Grammar::load(path)
                .with_context(|| format!("failed to load grammar {}", path.display()))?,
        ),
        None => parser
            .grammar_for_file(&cli.file)
            .cloned()
            .with_context(|| format!("no grammar found for {}", cli.file.display()))?,
    };

    let registry = ThemeRegistry::from_config(&config);
    let theme_name = cli.theme.as_deref().unwrap_or(&config.theme);
    let theme = registry
        .resolve(theme_name)
        .with_context(|| format!("failed to load theme {theme_name:?}"))?;

    let source = std::fs::read_to_string(&cli.file)
        .with_context(|| format!("failed to read {}", cli.file.display()))?;
    let mut document = DocumentHighlighter::new(grammar, theme, &source);

    match cli.format {
        Format::Ansi => print_ansi(&mut document, &parser, cli.selected),
        Format::Json => print_json(&mut document, &parser),
    }
}

fn print_ansi(document: &mut DocumentHighlighter, parser: &Parser, selected: bool) -> Result<()> {
    let selection = selected.then(|| 0..document.line_count());
    let text = document.styled_document(parser, selection)?;

    let mut out = std::io::stdout().lock();
    let lines: Vec<&str> = text.text().split('\n').collect();
    let mut start = 0;
    for (index, line) in lines.iter().enumerate() {
        let styled = render::styled_line(&text, start..start + line.len());
        for span in &styled.spans {
            let style = span.style;
            if let Some(color) = style.fg.and_then(terminal_color) {
                queue!(out, SetForegroundColor(color))?;
            }
            if let Some(color) = style.bg.and_then(terminal_color) {
                queue!(out, SetBackgroundColor(color))?;
            }
            if style.add_modifier.contains(Modifier::BOLD) {
                queue!(out, SetAttribute(Attribute::Bold))?;
            }
            if style.add_modifier.contains(Modifier::ITALIC) {
                queue!(out, SetAttribute(Attribute::Italic))?;
            }
            if style.add_modifier.contains(Modifier::UNDERLINED) {
                queue!(out, SetAttribute(Attribute::Underlined))?;
            }
            if let Some(color) = style.underline_color.and_then(terminal_color) {
                queue!(out, SetUnderlineColor(color))?;
            }
            queue!(
                out,
                Print(span.content.as_ref()),
                SetAttribute(Attribute::Reset),
                ResetColor
            )?;
        }
        // Mirror the input: no newline after the last line
        if index + 1 < lines.len() {
            queue!(out, Print("\n"))?;
        }
        start += line.len() + 1;
    }
    out.flush()?;
    Ok(())
}

fn terminal_color(color: ratatui::style::Color) -> Option<TermColor> {
    match color {
        ratatui::style::Color::Rgb(r, g, b) => Some(TermColor::Rgb { r, g, b }),
        _ => None,
    }
}

fn print_json(document: &mut DocumentHighlighter, parser: &Parser) -> Result<()> {
    let mut out = std::io::stdout().lock();
    for index in 0..document.line_count() {
        let text = document.line_text(index).unwrap_or_default().to_string();
        let Some(tokens) = document.tokens(parser, index)? else {
            continue;
        };
        let tokens: Vec<serde_json::Value> = tokens
            .tokens()
            .iter()
            .map(|token| {
                serde_json::json!({
                    "start": token.range.start,
                    "end": token.range.end,
                    "text": &text[token.range.clone()],
                    "scopes": token
                        .scope_names()
                        .iter()
                        .map(|scope| scope.as_str())
                        .collect::<Vec<_>>(),
                })
            })
            .collect();
        let line = serde_json::json!({ "line": index, "tokens": tokens });
        writeln!(out, "{}", serde_json::to_string(&line)?)?;
    }
    out.flush()?;
    Ok(())
}
