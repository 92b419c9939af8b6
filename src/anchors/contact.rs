use std::ops::Range;

use anyhow::{Context, Result};
use regex::Regex;

use super::detector::{Detector, is_inside_href, links_with_href};
use super::matcher::{annotatable_text_nodes, split_at_ranges};
use crate::dom::Document;
use crate::model::{Anchor, AnchorKind};

const EMAIL_PATTERN: &str = r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}";
const MAILTO_PATTERN: &str = r"(?i)^\s*mailto:([^?#]+)";
const TEL_PATTERN: &str = r"(?i)^\s*tel:([^?]+)";
const PHONE_PATTERN: &str = r"(?x)
    (?:\+\s?48[\s.\-]?|\b00\s?48[\s.\-]?)?
    (?:
        \(?\b\d{2}\)?[\s.\-]?\d{3}[\s.\-]?\d{2}[\s.\-]?\d{2}\b
      | \b\d{3}[\s.\-]?\d{3}[\s.\-]?\d{3}\b
    )
    (?:\s*(?:wew|ext)\.?\s*\d{1,5}\b)?
";
const EXTENSION_PATTERN: &str = r"(?i)\b(?:extension|wew|ext|w|x)\b|[;#]";

const CONTACT_SCORE: f64 = 1.0;

fn percent_decode(raw: &str) -> String {
    urlencoding::decode(raw).map_or_else(|_| raw.to_string(), |decoded| decoded.into_owned())
}

pub fn normalize_email(raw: &str) -> String {
    percent_decode(raw.trim()).trim().to_lowercase()
}

pub struct EmailDetector {
    email: Regex,
    mailto: Regex,
}

impl EmailDetector {
    pub fn new() -> Result<Self> {
        Ok(Self {
            email: Regex::new(EMAIL_PATTERN).context("failed to compile email pattern")?,
            mailto: Regex::new(MAILTO_PATTERN).context("failed to compile mailto pattern")?,
        })
    }

    fn mailto_address(&self, href: &str) -> Option<String> {
        let address = self.mailto.captures(href)?.get(1)?.as_str();
        let address = normalize_email(address);
        (!address.is_empty()).then_some(address)
    }
}

impl Detector for EmailDetector {
    fn kind(&self) -> AnchorKind {
        AnchorKind::Email
    }

    fn detect_links(&self, doc: &Document) -> Vec<Anchor> {
        links_with_href(doc)
            .into_iter()
            .filter_map(|(link, href)| {
                let address = self.mailto_address(href)?;
                Some(
                    Anchor::detected(AnchorKind::Email, link, link, address, "det:mailto")
                        .with_score(CONTACT_SCORE),
                )
            })
            .collect()
    }

    fn detect_text(&self, doc: &mut Document) -> Vec<Anchor> {
        let mut anchors = Vec::new();
        for node in annotatable_text_nodes(doc, doc.root()) {
            if is_inside_href(doc, node, &self.mailto) {
                continue;
            }
            let Some(text) = doc.text(node) else {
                continue;
            };
            let found: Vec<(Range<usize>, String)> = self
                .email
                .find_iter(text)
                .map(|hit| (hit.range(), normalize_email(hit.as_str())))
                .collect();
            if found.is_empty() {
                continue;
            }

            let ranges: Vec<Range<usize>> = found.iter().map(|(range, _)| range.clone()).collect();
            let wrappers = split_at_ranges(doc, node, &ranges, AnchorKind::Email);
            for ((_, address), wrapper) in found.into_iter().zip(wrappers) {
                if let Some(span) = wrapper {
                    anchors.push(
                        Anchor::detected(AnchorKind::Email, span, span, address, "det:text")
                            .with_score(CONTACT_SCORE),
                    );
                }
            }
        }
        anchors
    }
}

pub struct PhoneDetector {
    phone: Regex,
    tel: Regex,
    extension: Regex,
}

impl PhoneDetector {
    pub fn new() -> Result<Self> {
        Ok(Self {
            phone: Regex::new(PHONE_PATTERN).context("failed to compile phone pattern")?,
            tel: Regex::new(TEL_PATTERN).context("failed to compile tel pattern")?,
            extension: Regex::new(EXTENSION_PATTERN)
                .context("failed to compile phone extension pattern")?,
        })
    }

    /// Reduces a phone number to its 9-digit national significant number.
    /// Anything after an extension marker is ignored.
    pub fn normalise_phone(&self, raw: &str) -> Option<String> {
        let cleaned = raw.replace('\u{a0}', " ");
        let cleaned = cleaned.trim();
        let head = self.extension.split(cleaned).next().unwrap_or(cleaned);

        let mut digits: String = head.chars().filter(char::is_ascii_digit).collect();
        if digits.starts_with("00") {
            digits = digits[2..].to_string();
        }
        if digits.starts_with("48") && digits.len() >= 11 {
            digits = digits[2..].to_string();
        }
        if digits.len() < 9 {
            return None;
        }
        Some(digits[digits.len() - 9..].to_string())
    }

    fn tel_number(&self, href: &str) -> Option<String> {
        let raw = self.tel.captures(href)?.get(1)?.as_str();
        self.normalise_phone(&percent_decode(raw))
    }
}

impl Detector for PhoneDetector {
    fn kind(&self) -> AnchorKind {
        AnchorKind::Phone
    }

    fn detect_links(&self, doc: &Document) -> Vec<Anchor> {
        links_with_href(doc)
            .into_iter()
            .filter_map(|(link, href)| {
                let number = self.tel_number(href)?;
                Some(
                    Anchor::detected(AnchorKind::Phone, link, link, number, "det:telhref")
                        .with_score(CONTACT_SCORE),
                )
            })
            .collect()
    }

    fn detect_text(&self, doc: &mut Document) -> Vec<Anchor> {
        let mut anchors = Vec::new();
        for node in annotatable_text_nodes(doc, doc.root()) {
            if is_inside_href(doc, node, &self.tel) {
                continue;
            }
            let Some(text) = doc.text(node) else {
                continue;
            };
            let found: Vec<(Range<usize>, String)> = self
                .phone
                .find_iter(text)
                .filter_map(|hit| Some((hit.range(), self.normalise_phone(hit.as_str())?)))
                .collect();
            if found.is_empty() {
                continue;
            }

            let ranges: Vec<Range<usize>> = found.iter().map(|(range, _)| range.clone()).collect();
            let wrappers = split_at_ranges(doc, node, &ranges, AnchorKind::Phone);
            for ((_, number), wrapper) in found.into_iter().zip(wrappers) {
                if let Some(span) = wrapper {
                    anchors.push(
                        Anchor::detected(AnchorKind::Phone, span, span, number, "det:text")
                            .with_score(CONTACT_SCORE),
                    );
                }
            }
        }
        anchors
    }
}
