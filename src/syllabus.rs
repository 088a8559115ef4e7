// Copyright 2026 coursedl contributors
// SPDX-License-Identifier: MIT

//! Syllabus parsing — recover the ordered section → lecture → resource
//! tree from the course listing page.
//!
//! The markup is semi-structured at best: section headers are marker divs
//! whose lecture list is the *sibling* element that follows, resource
//! containers are optional, and some videos are only reachable through a
//! modal-iframe link to a secondary page. The tree comes back in document
//! order; callers own it outright.

use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use url::Url;

use crate::auth::AuthSession;
use crate::client::Transport;
use crate::define;
use crate::error::CourseError;
use crate::resolver;
use crate::utils::{clean_url, derive_filename};

/// A downloadable artifact attached to a lecture.
///
/// `url` is always absolute and scheme-qualified; bare URLs from the
/// markup are normalized before a `Resource` is built. `ext` carries no
/// leading dot and is lowercased.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Resource {
    pub url: String,
    pub name: String,
    pub filename: String,
    pub ext: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Lecture {
    pub name: String,
    pub resources: Vec<Resource>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Section {
    pub name: String,
    pub lectures: Vec<Lecture>,
}

/// Fetch capability handed to the parser, so tests can feed canned pages
/// and the resolver never needs to know about sessions.
#[async_trait::async_trait]
pub trait PageFetcher: Sync {
    async fn get_page(&self, url: &str) -> Result<String, CourseError>;
}

/// Fetches pages through an authenticated session's cookie jar.
pub struct SessionFetcher<'a> {
    client: &'a dyn Transport,
    session: &'a AuthSession,
}

impl<'a> SessionFetcher<'a> {
    pub fn new(client: &'a dyn Transport, session: &'a AuthSession) -> Self {
        Self { client, session }
    }
}

#[async_trait::async_trait]
impl PageFetcher for SessionFetcher<'_> {
    async fn get_page(&self, url: &str) -> Result<String, CourseError> {
        let response = self.client.get(url, self.session.jar()).await?;
        if !response.is_success() {
            return Err(CourseError::CourseAuthentication(format!(
                "{url} returned {}",
                response.status
            )));
        }
        Ok(response.body)
    }
}

/// A lecture whose video must be recovered from its secondary page.
struct PendingModal {
    section: usize,
    lecture: usize,
    url: String,
}

/// Walks the syllabus page and runs the modal fallback for lectures whose
/// video is not listed directly.
pub struct SyllabusParser<'a> {
    fetcher: &'a dyn PageFetcher,
}

impl<'a> SyllabusParser<'a> {
    pub fn new(fetcher: &'a dyn PageFetcher) -> Self {
        Self { fetcher }
    }

    /// Fetch and parse the syllabus for `course`.
    pub async fn parse_course(&self, course: &str) -> Result<Vec<Section>, CourseError> {
        let html = self
            .fetcher
            .get_page(&define::lecture_index_url(course))
            .await?;
        self.parse(&html).await
    }

    /// Parse an already-fetched syllabus page, resolving hidden videos
    /// sequentially (one secondary fetch at a time).
    pub async fn parse(&self, html: &str) -> Result<Vec<Section>, CourseError> {
        let (mut sections, pending) = extract(html)?;
        for p in pending {
            let lecture = &mut sections[p.section].lectures[p.lecture];
            resolver::resolve_hidden(self.fetcher, lecture, &p.url).await;
        }
        Ok(sections)
    }
}

/// Pure structural extraction: no fetching, no fallback resolution.
pub fn extract_sections(html: &str) -> Result<Vec<Section>, CourseError> {
    Ok(extract(html)?.0)
}

fn extract(html: &str) -> Result<(Vec<Section>, Vec<PendingModal>), CourseError> {
    let header_sel = Selector::parse("div.course-item-list-header").unwrap();
    let heading_sel = Selector::parse("h3").unwrap();
    let item_sel = Selector::parse("li").unwrap();
    let anchor_sel = Selector::parse("a").unwrap();
    let modal_sel = Selector::parse("a[data-modal-iframe]").unwrap();

    let document = Html::parse_document(html);
    let mut sections: Vec<Section> = Vec::new();
    let mut pending = Vec::new();

    for header in document.select(&header_sel) {
        let name = header
            .select(&heading_sel)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                CourseError::Parse(format!(
                    "section {} has no heading",
                    sections.len() + 1
                ))
            })?;

        let mut lectures = Vec::new();
        // The lecture list is the element sibling right after the header.
        let list = header.next_siblings().find_map(ElementRef::wrap);
        if let Some(list) = list {
            for item in list.select(&item_sel) {
                let anchor = item.select(&anchor_sel).next().ok_or_else(|| {
                    CourseError::Parse(format!("lecture in section '{name}' has no link"))
                })?;
                let lecture_name = element_text(anchor);
                if lecture_name.is_empty() {
                    return Err(CourseError::Parse(format!(
                        "lecture in section '{name}' has an empty name"
                    )));
                }

                let resources = collect_resources(&item);
                if !resources.iter().any(|r| r.ext == "mp4") {
                    if let Some(modal_url) = item
                        .select(&modal_sel)
                        .next()
                        .and_then(|a| a.value().attr("data-modal-iframe"))
                        .and_then(clean_url)
                    {
                        pending.push(PendingModal {
                            section: sections.len(),
                            lecture: lectures.len(),
                            url: modal_url,
                        });
                    }
                    // No modal link either: some lectures simply have no
                    // recording, leave the list as-is.
                }
                lectures.push(Lecture {
                    name: lecture_name,
                    resources,
                });
            }
        }

        sections.push(Section { name, lectures });
    }

    Ok((sections, pending))
}

/// Pull resource links out of a lecture item's resource container.
///
/// Kept: links with a derivable extension, and extension-less links served
/// from the platform CDN (many of those have no extension at all). Always
/// dropped: raw source videos — huge duplicates of the compressed mp4.
fn collect_resources(item: &ElementRef) -> Vec<Resource> {
    let container_sel = Selector::parse("div.course-lecture-item-resource").unwrap();
    let link_sel = Selector::parse("a[href]").unwrap();

    let mut resources = Vec::new();
    let container = match item.select(&container_sel).next() {
        Some(c) => c,
        None => return resources,
    };

    for link in container.select(&link_sel) {
        let href = match link.value().attr("href").and_then(clean_url) {
            Some(href) => href,
            None => continue,
        };
        if href.contains(define::RAW_VIDEO_MARKER) {
            continue;
        }
        let url = match Url::parse(&href) {
            Ok(url) => url,
            Err(_) => continue,
        };
        let (filename, ext) = derive_filename(&url);
        let on_cdn = url
            .host_str()
            .is_some_and(|h| h.ends_with(define::CDN_SUFFIX));
        if ext.is_empty() && !on_cdn {
            continue;
        }

        let mut name = element_text(link);
        if name.is_empty() {
            name = filename.clone();
        }
        resources.push(Resource {
            url: href,
            name,
            filename,
            ext,
        });
    }
    resources
}

fn element_text(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}
