use tracing::error;

use crate::error::AnalysisError;
use crate::figure::{Figure, Layer};
use crate::frame::{DataFrame, Series};

// Execution scope for model-authored plot scripts. The scope binds `df` to
// the caller's dataframe and exposes a fixed set of drawing and decoration
// calls; it is a symbol table, not a security boundary, and the producing
// agent is trusted.

pub trait ErrorSink {
    fn report(&self, message: &str);
}

// Default sink for callers without their own error surface.
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn report(&self, message: &str) {
        error!("{}", message);
    }
}

const DRAW_FUNCTIONS: [&str; 4] = ["hist", "bar", "line", "scatter"];
const DEFAULT_HIST_BINS: usize = 20;
const BAR_MAX_CATEGORIES: usize = 20;
const MISSING_LABEL: &str = "(missing)";

pub fn looks_like_plot_code(code: &str) -> bool {
    let compact: String = code.chars().filter(|c| !c.is_whitespace()).collect();
    DRAW_FUNCTIONS
        .iter()
        .any(|name| compact.contains(&format!("{}(", name)))
}

// Every failure goes to the sink and yields no figure; nothing raises out of
// the sandbox. A script that runs to completion without drawing counts as a
// failure as well.
pub fn execute(code: &str, frame: &DataFrame, errors: &dyn ErrorSink) -> Option<Figure> {
    match run(code, frame) {
        Ok(figure) => {
            if figure.has_layers() {
                Some(figure)
            } else {
                errors.report(
                    &AnalysisError::ChartExecution {
                        message: "script completed without drawing a figure".to_string(),
                    }
                    .to_string(),
                );
                None
            }
        }
        Err(e) => {
            errors.report(&e.to_string());
            None
        }
    }
}

fn run(code: &str, frame: &DataFrame) -> Result<Figure, AnalysisError> {
    let tokens = tokenize(code)?;
    let calls = Parser::new(tokens).parse_script()?;

    let mut figure = Figure::new();
    for call in &calls {
        apply(call, frame, &mut figure)?;
    }

    Ok(figure)
}

fn execution_error(message: impl Into<String>) -> AnalysisError {
    AnalysisError::ChartExecution {
        message: message.into(),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Number(f64),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Equals,
    Separator,
}

fn tokenize(code: &str) -> Result<Vec<Token>, AnalysisError> {
    let mut tokens = Vec::new();
    let mut chars = code.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\r' => {
                chars.next();
            }
            '\n' | ';' => {
                chars.next();
                tokens.push(Token::Separator);
            }
            '#' => {
                while let Some(&c) = chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '[' => {
                chars.next();
                tokens.push(Token::LBracket);
            }
            ']' => {
                chars.next();
                tokens.push(Token::RBracket);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '=' => {
                chars.next();
                tokens.push(Token::Equals);
            }
            '"' | '\'' => {
                let quote = c;
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == quote {
                        closed = true;
                        break;
                    }
                    value.push(c);
                }
                if !closed {
                    return Err(execution_error("unterminated string literal"));
                }
                tokens.push(Token::Str(value));
            }
            c if c.is_ascii_digit() || c == '-' || c == '.' => {
                let mut literal = String::new();
                literal.push(c);
                chars.next();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' {
                        literal.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| execution_error(format!("invalid number `{}`", literal)))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            c => {
                return Err(execution_error(format!("unexpected character `{}`", c)));
            }
        }
    }

    Ok(tokens)
}

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Number(f64),
    Column(String),
}

#[derive(Debug, Clone)]
struct Arg {
    keyword: Option<String>,
    value: Value,
}

#[derive(Debug, Clone)]
struct Call {
    name: String,
    args: Vec<Arg>,
}

impl Call {
    fn positional(&self, index: usize) -> Option<&Value> {
        self.args
            .iter()
            .filter(|a| a.keyword.is_none())
            .nth(index)
            .map(|a| &a.value)
    }

    fn positional_count(&self) -> usize {
        self.args.iter().filter(|a| a.keyword.is_none()).count()
    }

    fn keyword(&self, name: &str) -> Option<&Value> {
        self.args
            .iter()
            .find(|a| a.keyword.as_deref() == Some(name))
            .map(|a| &a.value)
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), Some(Token::Separator)) {
            self.pos += 1;
        }
    }

    fn parse_script(mut self) -> Result<Vec<Call>, AnalysisError> {
        let mut calls = Vec::new();

        loop {
            self.skip_separators();
            if self.peek().is_none() {
                break;
            }
            calls.push(self.parse_call()?);
        }

        Ok(calls)
    }

    fn parse_call(&mut self) -> Result<Call, AnalysisError> {
        let name = match self.next() {
            Some(Token::Ident(name)) => name,
            _ => return Err(execution_error("expected a function call")),
        };

        match self.next() {
            Some(Token::LParen) => {}
            _ => {
                return Err(execution_error(format!(
                    "expected `(` after `{}`",
                    name
                )))
            }
        }

        let mut args = Vec::new();
        loop {
            // Model output often wraps argument lists across lines.
            self.skip_separators();
            if matches!(self.peek(), Some(Token::RParen)) {
                self.next();
                break;
            }

            args.push(self.parse_arg()?);
            self.skip_separators();

            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => break,
                _ => {
                    return Err(execution_error(format!(
                        "expected `,` or `)` in arguments of `{}`",
                        name
                    )))
                }
            }
        }

        Ok(Call { name, args })
    }

    fn parse_arg(&mut self) -> Result<Arg, AnalysisError> {
        if matches!(
            (self.peek(), self.tokens.get(self.pos + 1)),
            (Some(Token::Ident(_)), Some(Token::Equals))
        ) {
            let keyword = match self.next() {
                Some(Token::Ident(name)) => name,
                _ => return Err(execution_error("expected an argument name")),
            };
            self.next();
            let value = self.parse_value()?;
            return Ok(Arg {
                keyword: Some(keyword),
                value,
            });
        }

        let value = self.parse_value()?;
        Ok(Arg {
            keyword: None,
            value,
        })
    }

    fn parse_value(&mut self) -> Result<Value, AnalysisError> {
        match self.next() {
            Some(Token::Str(value)) => Ok(Value::Str(value)),
            Some(Token::Number(value)) => Ok(Value::Number(value)),
            Some(Token::Ident(ident)) if ident == "df" => {
                match self.next() {
                    Some(Token::LBracket) => {}
                    _ => return Err(execution_error("expected `[` after `df`")),
                }
                let column = match self.next() {
                    Some(Token::Str(column)) => column,
                    _ => {
                        return Err(execution_error(
                            "expected a quoted column name inside `df[...]`",
                        ))
                    }
                };
                match self.next() {
                    Some(Token::RBracket) => Ok(Value::Column(column)),
                    _ => Err(execution_error("expected `]` after column name")),
                }
            }
            Some(Token::Ident(ident)) => Err(execution_error(format!(
                "unknown name `{}` in argument position",
                ident
            ))),
            _ => Err(execution_error("expected an argument value")),
        }
    }
}

fn apply(call: &Call, frame: &DataFrame, figure: &mut Figure) -> Result<(), AnalysisError> {
    match call.name.as_str() {
        "hist" => apply_hist(call, frame, figure),
        "bar" => apply_bar(call, frame, figure),
        "line" => apply_xy(call, frame, figure, false),
        "scatter" => apply_xy(call, frame, figure, true),
        "title" => {
            figure.title = Some(string_arg(call)?);
            Ok(())
        }
        "xlabel" => {
            figure.x_label = Some(string_arg(call)?);
            Ok(())
        }
        "ylabel" => {
            figure.y_label = Some(string_arg(call)?);
            Ok(())
        }
        name => Err(execution_error(format!("unknown function `{}`", name))),
    }
}

fn string_arg(call: &Call) -> Result<String, AnalysisError> {
    match call.positional(0) {
        Some(Value::Str(value)) if call.positional_count() == 1 => Ok(value.clone()),
        _ => Err(execution_error(format!(
            "`{}` expects a single quoted string",
            call.name
        ))),
    }
}

fn column_name(call: &Call, value: Option<&Value>) -> Result<String, AnalysisError> {
    match value {
        Some(Value::Column(name)) | Some(Value::Str(name)) => Ok(name.clone()),
        _ => Err(execution_error(format!(
            "`{}` expects a column reference like df[\"name\"]",
            call.name
        ))),
    }
}

fn resolve<'a>(frame: &'a DataFrame, name: &str) -> Result<&'a Series, AnalysisError> {
    frame
        .column(name)
        .ok_or_else(|| execution_error(format!("unknown column `{}`", name)))
}

fn numeric_series(series: &Series) -> Result<Vec<f64>, AnalysisError> {
    series
        .numeric_values()
        .ok_or_else(|| execution_error(format!("column `{}` is not numeric", series.name())))
}

fn apply_hist(call: &Call, frame: &DataFrame, figure: &mut Figure) -> Result<(), AnalysisError> {
    let name = column_name(call, call.positional(0))?;
    let series = resolve(frame, &name)?;
    let values = numeric_series(series)?;

    let bins = match call.keyword("bins").or_else(|| call.positional(1)) {
        Some(Value::Number(n)) if *n >= 1.0 => *n as usize,
        Some(_) => {
            return Err(execution_error("`bins` must be a positive number"));
        }
        None => DEFAULT_HIST_BINS,
    };

    let (bin_edges, counts) = bin_values(&values, bins);

    figure.layers.push(Layer::Histogram {
        column: name,
        bin_edges,
        counts,
    });

    Ok(())
}

fn bin_values(values: &[f64], bins: usize) -> (Vec<f64>, Vec<usize>) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values {
        min = min.min(*v);
        max = max.max(*v);
    }

    // Degenerate range: all values equal; widen to a unit-wide span.
    if !(max > min) {
        min -= 0.5;
        max += 0.5;
    }

    let width = (max - min) / bins as f64;
    let bin_edges: Vec<f64> = (0..=bins).map(|i| min + width * i as f64).collect();

    let mut counts = vec![0usize; bins];
    for v in values {
        let index = (((v - min) / width) as usize).min(bins - 1);
        counts[index] += 1;
    }

    (bin_edges, counts)
}

fn apply_bar(call: &Call, frame: &DataFrame, figure: &mut Figure) -> Result<(), AnalysisError> {
    match call.positional_count() {
        1 => {
            let name = column_name(call, call.positional(0))?;
            let series = resolve(frame, &name)?;
            let (labels, values) = category_counts(series);
            figure.layers.push(Layer::Bar { labels, values });
            Ok(())
        }
        2 => {
            let label_name = column_name(call, call.positional(0))?;
            let value_name = column_name(call, call.positional(1))?;
            let label_series = resolve(frame, &label_name)?;
            let value_series = resolve(frame, &value_name)?;

            let mut labels = Vec::new();
            let mut values = Vec::new();
            for index in 0..value_series.len() {
                let Some(cell) = value_series.get(index) else {
                    continue;
                };
                let value = cell.trim().parse::<f64>().map_err(|_| {
                    execution_error(format!("column `{}` is not numeric", value_name))
                })?;
                let label = label_series
                    .get(index)
                    .unwrap_or(MISSING_LABEL)
                    .to_string();
                labels.push(label);
                values.push(value);
            }

            figure.layers.push(Layer::Bar { labels, values });
            Ok(())
        }
        _ => Err(execution_error(
            "`bar` expects one category column or a label and a value column",
        )),
    }
}

// Category frequencies, largest first; ties break on the label so the same
// input always yields the same figure.
fn category_counts(series: &Series) -> (Vec<String>, Vec<f64>) {
    let mut counts = std::collections::BTreeMap::new();
    for index in 0..series.len() {
        let label = series.get(index).unwrap_or(MISSING_LABEL);
        *counts.entry(label.to_string()).or_insert(0usize) += 1;
    }

    let mut entries: Vec<(String, usize)> = counts.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.truncate(BAR_MAX_CATEGORIES);

    let labels = entries.iter().map(|(label, _)| label.clone()).collect();
    let values = entries.iter().map(|(_, count)| *count as f64).collect();
    (labels, values)
}

fn apply_xy(
    call: &Call,
    frame: &DataFrame,
    figure: &mut Figure,
    scatter: bool,
) -> Result<(), AnalysisError> {
    if call.positional_count() != 2 {
        return Err(execution_error(format!(
            "`{}` expects two column arguments",
            call.name
        )));
    }

    let x_name = column_name(call, call.positional(0))?;
    let y_name = column_name(call, call.positional(1))?;
    let x_series = resolve(frame, &x_name)?;
    let y_series = resolve(frame, &y_name)?;

    let mut x = Vec::new();
    let mut y = Vec::new();
    // Rows missing either coordinate are skipped; the rest stay paired.
    for index in 0..x_series.len().min(y_series.len()) {
        let (Some(x_cell), Some(y_cell)) = (x_series.get(index), y_series.get(index)) else {
            continue;
        };
        let x_value = x_cell
            .trim()
            .parse::<f64>()
            .map_err(|_| execution_error(format!("column `{}` is not numeric", x_name)))?;
        let y_value = y_cell
            .trim()
            .parse::<f64>()
            .map_err(|_| execution_error(format!("column `{}` is not numeric", y_name)))?;
        x.push(x_value);
        y.push(y_value);
    }

    let layer = if scatter {
        Layer::Scatter {
            x_column: x_name,
            y_column: y_name,
            x,
            y,
        }
    } else {
        Layer::Line {
            x_column: x_name,
            y_column: y_name,
            x,
            y,
        }
    };

    figure.layers.push(layer);
    Ok(())
}
