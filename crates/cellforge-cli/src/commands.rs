//! Command surface: the `clap` derive types dispatched both from process
//! arguments (one-shot mode) and from lines read inside the interactive
//! session loop.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "cellforge", author, version, about = "Spreadsheet session shell over the cellforge engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open a session dump file
    Open {
        path: std::path::PathBuf,
        #[arg(long)]
        readonly: bool,
    },
    /// Start a new, empty in-memory workbook
    Create {
        #[arg(long, value_delimiter = ',', required = true)]
        sheets: Vec<String>,
    },
    /// Close the current session
    Close {
        #[arg(long)]
        discard: bool,
    },
    /// List the sheets in the open workbook
    Sheets,
    /// Change the active sheet
    Select { name: String },
    /// Print the used range of a sheet (default: the active sheet)
    Bounds { sheet: Option<String> },
    /// Print a range's contents as a grid
    View {
        range: String,
        #[arg(long)]
        formulas: bool,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print one cell's full detail
    Cell { r#ref: String },
    /// Search cell text and formula expressions for a regular expression
    Search {
        pattern: String,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Evaluate an ad hoc formula without mutating the sheet
    Eval {
        formula: String,
        /// A `ref=value` override, e.g. `--with A1=5`; repeatable
        #[arg(long = "with")]
        with: Vec<String>,
    },
    /// Write a literal value into a cell (a leading `=` is treated as a formula)
    Put { r#ref: String, value: String },
    /// Write a formula into a cell explicitly
    Putf { r#ref: String, formula: String },
    /// Sort the rows of a range by one or more columns
    Sort {
        range: String,
        #[arg(long = "by", required = true)]
        by: Vec<String>,
        #[arg(long)]
        header: bool,
    },
    /// Clear the contents of a range
    Clear {
        range: String,
        #[arg(long)]
        all: bool,
        #[arg(long)]
        styles: bool,
        #[arg(long)]
        comments: bool,
    },
    /// Save to the session's current path
    Save,
    /// Save to a new path and make it the session's path
    Saveas { path: std::path::PathBuf },
    /// Exit the session shell
    #[command(alias = "exit")]
    Quit,
}

/// Parse one `--with ref=value` override into its two halves.
pub fn parse_with_pair(s: &str) -> anyhow::Result<(String, String)> {
    let (r, v) = s
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("expected ref=value, got '{s}'"))?;
    Ok((r.to_string(), v.to_string()))
}

/// A single `--by` key for `sort`: the column letters plus optional
/// direction and comparison-kind suffixes (`B:desc:num`).
#[derive(Debug, Clone)]
pub struct SortKey {
    pub column: String,
    pub descending: bool,
    pub numeric: bool,
}

impl SortKey {
    pub fn parse(spec: &str) -> anyhow::Result<Self> {
        let mut parts = spec.split(':');
        let column = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow::anyhow!("empty --by key"))?
            .to_string();
        let mut descending = false;
        let mut numeric = true;
        for part in parts {
            match part.to_ascii_lowercase().as_str() {
                "asc" => descending = false,
                "desc" => descending = true,
                "num" => numeric = true,
                "text" => numeric = false,
                other => anyhow::bail!("unknown sort key modifier '{other}' in '{spec}'"),
            }
        }
        Ok(SortKey { column, descending, numeric })
    }
}

/// Split a line into shell-like words, honoring `'single'` and `"double"`
/// quoting so values and formulas can contain spaces. No escape characters
/// inside quotes beyond the quote itself ending the token.
pub fn tokenize_line(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        let mut token = String::new();
        if c == '"' || c == '\'' {
            let quote = c;
            chars.next();
            for ch in chars.by_ref() {
                if ch == quote {
                    break;
                }
                token.push(ch);
            }
        } else {
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() {
                    break;
                }
                token.push(ch);
                chars.next();
            }
        }
        tokens.push(token);
    }
    tokens
}

/// Parse one REPL line into a [`Command`], prepending the binary name so the
/// same `clap` definitions serve both process-argument and REPL dispatch.
pub fn parse_line(line: &str) -> Result<Command, clap::Error> {
    let mut argv = vec!["cellforge".to_string()];
    argv.extend(tokenize_line(line));
    Cli::try_parse_from(argv).map(|cli| cli.command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_quoted_values() {
        let tokens = tokenize_line(r#"put A1 "hello world""#);
        assert_eq!(tokens, vec!["put", "A1", "hello world"]);
    }

    #[test]
    fn sort_key_parses_modifiers() {
        let key = SortKey::parse("B:desc:text").unwrap();
        assert_eq!(key.column, "B");
        assert!(key.descending);
        assert!(!key.numeric);
    }

    #[test]
    fn with_pair_requires_equals() {
        assert_eq!(parse_with_pair("A1=5").unwrap(), ("A1".to_string(), "5".to_string()));
        assert!(parse_with_pair("A1").is_err());
    }
}
