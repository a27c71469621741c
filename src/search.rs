//! Full-text search (C9): a small query language lowered to SQLite FTS5
//! `MATCH` syntax, executed against the `items_fts` virtual table the
//! schema keeps in sync with `items`.
//!
//! Grammar (loosest to tightest precedence): `OR`, implicit/explicit
//! `AND`, `NOT`, then a primary (parenthesised expression, quoted phrase,
//! or a bareword token with an optional `field:` prefix and trailing `*`
//! for a prefix match).

use rusqlite::Connection;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    And,
    Or,
    Not,
    Phrase(String),
    Word { field: Option<String>, value: String, prefix: bool },
}

fn tokenize(query: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = query.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '"' => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end] != '"' {
                    end += 1;
                }
                if end >= chars.len() {
                    return Err(Error::InvalidQuery { reason: "unterminated quote".to_string() });
                }
                let phrase: String = chars[start..end].iter().collect();
                if phrase.trim().is_empty() {
                    return Err(Error::InvalidQuery { reason: "empty phrase".to_string() });
                }
                tokens.push(Token::Phrase(phrase));
                i = end + 1;
            }
            _ => {
                let start = i;
                while i < chars.len() && !chars[i].is_whitespace() && chars[i] != '(' && chars[i] != ')' {
                    i += 1;
                }
                let raw: String = chars[start..i].iter().collect();
                match raw.as_str() {
                    "AND" => tokens.push(Token::And),
                    "OR" => tokens.push(Token::Or),
                    "NOT" => tokens.push(Token::Not),
                    _ => tokens.push(word_token(&raw)?),
                }
            }
        }
    }
    Ok(tokens)
}

fn word_token(raw: &str) -> Result<Token> {
    let (field, rest) = match raw.split_once(':') {
        Some((f, r)) if is_known_field(f) && !r.is_empty() => (Some(f.to_string()), r),
        _ => (None, raw),
    };
    let (value, prefix) = rest
        .strip_suffix('*')
        .map_or((rest, false), |stripped| (stripped, true));
    if value.is_empty() {
        return Err(Error::InvalidQuery { reason: format!("empty search term in `{raw}`") });
    }
    Ok(Token::Word { field, value: value.to_string(), prefix })
}

fn is_known_field(name: &str) -> bool {
    matches!(name, "title" | "description" | "content" | "tags")
}

/// AST node for a parsed query.
#[derive(Debug, Clone)]
enum Expr {
    Term { field: Option<String>, value: String, prefix: bool },
    Phrase(String),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_not()?;
        loop {
            match self.peek() {
                Some(Token::And) => {
                    self.advance();
                    let right = self.parse_not()?;
                    left = Expr::And(Box::new(left), Box::new(right));
                }
                Some(Token::LParen | Token::Phrase(_) | Token::Word { .. } | Token::Not) => {
                    // Implicit AND between adjacent primaries.
                    let right = self.parse_not()?;
                    left = Expr::And(Box::new(left), Box::new(right));
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if matches!(self.peek(), Some(Token::Not)) {
            self.advance();
            let inner = self.parse_primary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.advance() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(Error::InvalidQuery { reason: "unmatched `(`".to_string() }),
                }
            }
            Some(Token::Phrase(p)) => Ok(Expr::Phrase(p)),
            Some(Token::Word { field, value, prefix }) => Ok(Expr::Term { field, value, prefix }),
            other => Err(Error::InvalidQuery { reason: format!("unexpected token: {other:?}") }),
        }
    }
}

fn parse(query: &str) -> Result<Expr> {
    let tokens = tokenize(query)?;
    if tokens.is_empty() {
        return Err(Error::InvalidQuery { reason: "empty query".to_string() });
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(Error::InvalidQuery { reason: "trailing tokens after expression".to_string() });
    }
    Ok(expr)
}

/// Lower an AST to FTS5 `MATCH` syntax. FTS5 supports `AND`/`OR`/`NOT`,
/// parentheses, quoted phrases, `column:` prefixes, and trailing `*` for
/// prefix queries, so this is close to a direct translation.
fn lower(expr: &Expr) -> String {
    match expr {
        Expr::Term { field, value, prefix } => {
            let escaped = escape_term(value);
            let term = if *prefix { format!("{escaped}*") } else { escaped };
            match field {
                Some(f) => format!("{f}:{term}"),
                None => term,
            }
        }
        Expr::Phrase(p) => format!("\"{}\"", p.replace('"', "\"\"")),
        Expr::And(l, r) => format!("({} AND {})", lower(l), lower(r)),
        Expr::Or(l, r) => format!("({} OR {})", lower(l), lower(r)),
        Expr::Not(e) => format!("NOT {}", lower(e)),
    }
}

fn escape_term(value: &str) -> String {
    if value.chars().all(|c| c.is_alphanumeric() || c == '_') {
        value.to_string()
    } else {
        format!("\"{}\"", value.replace('"', "\"\""))
    }
}

fn force_trailing_prefix(expr: Expr) -> Expr {
    match expr {
        Expr::Term { field, value, .. } => Expr::Term { field, value, prefix: true },
        Expr::Phrase(p) => Expr::Phrase(p),
        Expr::And(l, r) => Expr::And(l, Box::new(force_trailing_prefix(*r))),
        Expr::Or(l, r) => Expr::Or(l, Box::new(force_trailing_prefix(*r))),
        Expr::Not(e) => Expr::Not(Box::new(force_trailing_prefix(*e))),
    }
}

/// One search result, with a `bm25`-derived rank and a highlighted snippet.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchHit {
    pub item_type: String,
    pub id: String,
    pub title: String,
    pub snippet: String,
    pub rank: f64,
}

fn types_clause(types: Option<&[String]>, params: &mut Vec<Box<dyn rusqlite::ToSql>>) -> String {
    match types {
        Some(list) if !list.is_empty() => {
            let placeholders: Vec<String> = list
                .iter()
                .map(|t| {
                    params.push(Box::new(t.clone()));
                    format!("?{}", params.len())
                })
                .collect();
            format!(" AND i.item_type IN ({})", placeholders.join(","))
        }
        _ => String::new(),
    }
}

/// Run a search query, ranked best-first.
///
/// # Errors
///
/// `InvalidQuery` if `query` cannot be parsed, or a database error.
pub fn search(
    conn: &Connection,
    query: &str,
    types: Option<&[String]>,
    limit: usize,
    offset: usize,
) -> Result<Vec<SearchHit>> {
    let expr = parse(query)?;
    let match_expr = lower(&expr);

    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(match_expr)];
    let type_sql = types_clause(types, &mut params);

    let sql = format!(
        "SELECT i.item_type, i.id, i.title,
                snippet(items_fts, -1, '[', ']', '...', 10) AS snip,
                bm25(items_fts) AS rank
         FROM items_fts
         JOIN items i ON i.rowid = items_fts.rowid
         WHERE items_fts MATCH ?1{type_sql}
         ORDER BY rank
         LIMIT ?{} OFFSET ?{}",
        params.len() + 1,
        params.len() + 2,
    );
    params.push(Box::new(limit as i64));
    params.push(Box::new(offset as i64));

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(param_refs.as_slice(), |row| {
        Ok(SearchHit {
            item_type: row.get(0)?,
            id: row.get(1)?,
            title: row.get(2)?,
            snippet: row.get(3)?,
            rank: row.get(4)?,
        })
    })?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
}

/// Type-ahead suggestions: forces a prefix match on the last token.
///
/// # Errors
///
/// `InvalidQuery` if `prefix` cannot be parsed, or a database error.
pub fn suggest(conn: &Connection, prefix: &str, types: Option<&[String]>, limit: usize) -> Result<Vec<SearchHit>> {
    if prefix.trim().is_empty() {
        return Err(Error::InvalidQuery { reason: "empty prefix".to_string() });
    }
    let expr = force_trailing_prefix(parse(prefix)?);
    let match_expr = lower(&expr);

    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(match_expr)];
    let type_sql = types_clause(types, &mut params);
    let sql = format!(
        "SELECT i.item_type, i.id, i.title,
                snippet(items_fts, -1, '[', ']', '...', 6) AS snip,
                bm25(items_fts) AS rank
         FROM items_fts
         JOIN items i ON i.rowid = items_fts.rowid
         WHERE items_fts MATCH ?1{type_sql}
         ORDER BY rank
         LIMIT ?{}",
        params.len() + 1,
    );
    params.push(Box::new(limit as i64));

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(param_refs.as_slice(), |row| {
        Ok(SearchHit {
            item_type: row.get(0)?,
            id: row.get(1)?,
            title: row.get(2)?,
            snippet: row.get(3)?,
            rank: row.get(4)?,
        })
    })?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
}

/// Count matches without fetching rows.
///
/// # Errors
///
/// `InvalidQuery` if `query` cannot be parsed, or a database error.
pub fn count(conn: &Connection, query: &str, types: Option<&[String]>) -> Result<i64> {
    let expr = parse(query)?;
    let match_expr = lower(&expr);
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(match_expr)];
    let type_sql = types_clause(types, &mut params);
    let sql = format!(
        "SELECT COUNT(*) FROM items_fts JOIN items i ON i.rowid = items_fts.rowid
         WHERE items_fts MATCH ?1{type_sql}"
    );
    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    conn.query_row(&sql, param_refs.as_slice(), |r| r.get(0)).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_phrases_and_fields() {
        let tokens = tokenize(r#""null pointer" AND bug*"#).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Phrase("null pointer".to_string()),
                Token::And,
                Token::Word { field: None, value: "bug".to_string(), prefix: true },
            ]
        );
    }

    #[test]
    fn tokenizes_field_prefixed_term() {
        let tokens = tokenize("title:crash").unwrap();
        assert_eq!(tokens, vec![Token::Word { field: Some("title".to_string()), value: "crash".to_string(), prefix: false }]);
    }

    #[test]
    fn parses_and_lowers_simple_query() {
        let expr = parse("crash AND parser").unwrap();
        assert_eq!(lower(&expr), "(crash AND parser)");
    }

    #[test]
    fn implicit_and_between_barewords() {
        let expr = parse("crash parser").unwrap();
        assert_eq!(lower(&expr), "(crash AND parser)");
    }

    #[test]
    fn field_prefix_and_wildcard() {
        let expr = parse("title:cra*").unwrap();
        assert_eq!(lower(&expr), "title:cra*");
    }

    #[test]
    fn rejects_empty_query() {
        assert!(matches!(parse("").unwrap_err(), Error::InvalidQuery { .. }));
        assert!(matches!(parse("   ").unwrap_err(), Error::InvalidQuery { .. }));
    }

    #[test]
    fn rejects_unmatched_parens() {
        assert!(parse("(crash AND parser").is_err());
    }

    #[test]
    fn suggest_forces_prefix_on_last_token() {
        let expr = force_trailing_prefix(parse("crash parser").unwrap());
        assert_eq!(lower(&expr), "(crash AND parser*)");
    }

    #[test]
    fn end_to_end_search_against_fts_table() {
        use crate::storage::{ItemRow, SqliteStorage};
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.seed_default_statuses().unwrap();
        storage.seed_type("issues", crate::model::BaseType::Tasks, "").unwrap();
        let now = chrono::Utc::now();
        let tags = std::collections::BTreeSet::new();
        let related = Vec::new();
        storage
            .mutate("test", "tester", |tx, _ctx| {
                SqliteStorage::upsert_item(
                    tx,
                    &ItemRow {
                        item_type: "issues",
                        id: "1",
                        title: "Null pointer crash in parser",
                        description: None,
                        content: Some("Segfault when parsing empty input".to_string()),
                        priority: crate::model::Priority::High,
                        status_id: 1,
                        start_date: None,
                        end_date: None,
                        start_time: None,
                        tags: &tags,
                        related: &related,
                        created_at: now,
                        updated_at: now,
                    },
                )
            })
            .unwrap();

        let hits = search(storage.conn(), "crash parser", None, 10, 0).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "1");

        let none = search(storage.conn(), "nonexistent_term_xyz", None, 10, 0).unwrap();
        assert!(none.is_empty());
    }
}
