//! Minimal HTML handling for operation links.
//!
//! Log records may carry an HTML link (`<a href="/node/1">view</a>`). Error
//! events get its text, structured log items get its target.

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_till, take_till1, take_until},
    character::complete::char,
    combinator::map,
    multi::many0,
    sequence::{delimited, preceded, terminated},
    IResult, Parser,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    Text(&'a str),
    Tag(&'a str),
}

fn token(input: &str) -> IResult<&str, Token<'_>> {
    alt((
        map(delimited(char('<'), take_till(|c| c == '>'), char('>')), Token::Tag),
        map(take_till1(|c| c == '<'), Token::Text),
        map(tag("<"), Token::Text),
    ))
    .parse(input)
}

fn quoted(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('"'), take_till(|c| c == '"'), char('"')),
        delimited(char('\''), take_till(|c| c == '\''), char('\'')),
    ))
    .parse(input)
}

fn href(input: &str) -> IResult<&str, &str> {
    preceded(
        terminated(tag_no_case("a"), take_until("href")),
        preceded(tag("href="), quoted),
    )
    .parse(input)
}

fn tokens(html: &str) -> Vec<Token<'_>> {
    match many0(token).parse(html) {
        Ok((rest, mut tokens)) => {
            if !rest.is_empty() {
                tokens.push(Token::Text(rest));
            }
            tokens
        }
        Err(_) => vec![Token::Text(html)],
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Converts an HTML fragment to plain text.
///
/// # Example
///
/// ```
/// use shared::builder::html::to_text;
///
/// assert_eq!(to_text(r#"<a href="/node/1">View &amp; edit</a>"#), "View & edit");
/// ```
#[must_use]
pub fn to_text(html: &str) -> String {
    let text: String = tokens(html)
        .into_iter()
        .filter_map(|t| match t {
            Token::Text(text) => Some(text),
            Token::Tag(_) => None,
        })
        .collect();
    decode_entities(&text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Returns the target of the last anchor in an HTML fragment.
#[must_use]
pub fn last_href(html: &str) -> Option<String> {
    tokens(html)
        .into_iter()
        .filter_map(|t| match t {
            Token::Tag(body) => href(body.trim_start()).ok().map(|(_, h)| h),
            Token::Text(_) => None,
        })
        .next_back()
        .map(decode_entities)
}
