//! Wikipedia collaborators: an HTTP fetcher and an article extractor.

use common::{Document, Extract, Fetch, FetchError, InvalidDocument, Page, Result};
use futures::{future::BoxFuture, FutureExt};
use regex::{Captures, Regex};

const USER_AGENT: &str = concat!("wikiwords/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Document, FetchError>> {
        async move {
            let request_error = |e: reqwest::Error| FetchError::Request {
                url: url.to_owned(),
                reason: e.to_string(),
            };

            let response = self
                .client
                .get(url)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(request_error)?;
            // Special:Random redirects to the article itself
            let url = response.url().to_string();
            let body = response.text().await.map_err(request_error)?;
            Ok(Document { url, body })
        }
        .boxed()
    }
}

/// Pulls title, section headings and body words out of an article page.
#[derive(Debug, Clone)]
pub struct WikiExtractor {
    title: Regex,
    headline: Regex,
    heading: Regex,
    edit_section: Regex,
    block: Regex,
    tag: Regex,
    entity: Regex,
    heading_junk: Regex,
    word_junk: Regex,
}

impl WikiExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            title: Regex::new(r#"(?s)<h1[^>]*id="firstHeading"[^>]*>(.*?)</h1>"#)?,
            headline: Regex::new(r#"(?s)<span[^>]*class="mw-headline"[^>]*>(.*?)</span>"#)?,
            heading: Regex::new(r#"(?s)<h[2-6]([^>]*)>(.*?)</h[2-6]>"#)?,
            edit_section: Regex::new(r#"(?s)<span class="mw-editsection">.*?\]</span></span>"#)?,
            block: Regex::new(r#"(?s)<(?:p|ul)(?:\s[^>]*)?>(.*?)</(?:p|ul)>"#)?,
            tag: Regex::new(r"<[^>]*>")?,
            entity: Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);")?,
            heading_junk: Regex::new(r"[^A-Za-z0-9_ '-]")?,
            word_junk: Regex::new(r"[^A-Za-z]")?,
        })
    }

    /// Markup to plain text.
    fn text(&self, html: &str) -> String {
        let stripped = self.tag.replace_all(html, " ");
        let decoded = self.entity.replace_all(&stripped, |caps: &Captures| decode_entity(&caps[1]));
        decoded.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Keeps word characters, hyphens and apostrophes inside words.
    fn clean_heading(&self, text: &str) -> String {
        let kept = self.heading_junk.replace_all(text, "");
        kept.split_whitespace()
            .map(|w| w.trim_matches(|c| c == '-' || c == '\''))
            .filter(|w| !w.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn headings(&self, content: &str) -> Vec<String> {
        let headlines: Vec<_> = self
            .headline
            .captures_iter(content)
            .map(|c| self.text(&c[1]))
            .collect();
        let raw = if !headlines.is_empty() {
            headlines
        } else {
            let content = self.edit_section.replace_all(content, "");
            self.heading
                .captures_iter(&content)
                .filter(|c| !c[1].contains("mw-toc-heading"))
                .map(|c| self.text(&c[2]))
                .collect()
        };
        raw.iter()
            .map(|h| self.clean_heading(h))
            .filter(|h| !h.is_empty())
            .collect()
    }

    fn words(&self, content: &str) -> Vec<String> {
        let body = match content.find(r#"id="mw-content-text""#) {
            Some(at) => &content[at..],
            None => content,
        };
        // navigation boxes and the footer follow the article text
        let body = BODY_END
            .iter()
            .filter_map(|marker| body.find(marker))
            .min()
            .map_or(body, |end| &body[..end]);
        self.block
            .captures_iter(body)
            .flat_map(|c| {
                let text = self.text(&c[1]);
                self.word_junk
                    .replace_all(&text, " ")
                    .split_whitespace()
                    .map(str::to_owned)
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

const BODY_END: [&str; 4] = [
    r#"class="printfooter""#,
    r#"id="catlinks""#,
    r#"id="footer""#,
    "<footer",
];

fn decode_entity(name: &str) -> String {
    let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        u32::from_str_radix(hex, 16).ok()
    } else if let Some(dec) = name.strip_prefix('#') {
        dec.parse().ok()
    } else {
        None
    };
    if let Some(c) = code.and_then(std::char::from_u32) {
        return c.to_string();
    }
    match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        _ => " ",
    }
    .to_owned()
}

impl Extract for WikiExtractor {
    fn extract(&self, document: &Document) -> Result<Page, InvalidDocument> {
        let invalid = |reason: &str| InvalidDocument {
            url: document.url.clone(),
            reason: reason.to_owned(),
        };

        let content = match document.body.find(r#"id="content""#) {
            Some(at) => &document.body[at..],
            None => return Err(invalid("no content element")),
        };
        let title = self
            .title
            .captures(content)
            .map(|c| self.clean_heading(&self.text(&c[1])))
            .ok_or_else(|| invalid("no title heading"))?;

        Ok(Page {
            title,
            headings: self.headings(content),
            words: self.words(content),
        })
    }
}
