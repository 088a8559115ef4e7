// Copyright 2026 coursedl contributors
// SPDX-License-Identifier: MIT

//! Hidden resource resolution for modal-iframe lectures.
//!
//! Some lectures do not list their video among the direct resource links;
//! the player lives on a secondary page reachable through the lecture's
//! modal link. Failures here are warnings, never fatal: a lecture without
//! a recording is a normal (if unfortunate) state of the platform.

use scraper::{Html, Selector};

use crate::define;
use crate::syllabus::{Lecture, PageFetcher, Resource};
use crate::utils::clean_url;

/// Fetch the lecture's secondary page and append whatever video and
/// subtitle resources it advertises. A transient fetch failure leaves the
/// lecture untouched.
pub async fn resolve_hidden(fetcher: &dyn PageFetcher, lecture: &mut Lecture, url: &str) {
    let page = match fetcher.get_page(url).await {
        Ok(page) => page,
        Err(e) => {
            tracing::warn!(error = %e, url, lecture = %lecture.name, "could not fetch lecture page");
            return;
        }
    };
    append_hidden_resources(lecture, &page);
}

/// Extract the player's mp4 source and subtitle tracks from a lecture
/// page. No video element means the lecture truly has no recording.
pub fn append_hidden_resources(lecture: &mut Lecture, html: &str) {
    let source_sel =
        Selector::parse(&format!(r#"source[type="{}"]"#, define::VIDEO_MIME)).unwrap();
    let track_sel = Selector::parse("track[srclang]").unwrap();

    let document = Html::parse_document(html);

    let video_src = document
        .select(&source_sel)
        .next()
        .and_then(|el| el.value().attr("src"))
        .and_then(clean_url);
    let src = match video_src {
        Some(src) => src,
        None => {
            tracing::warn!(lecture = %lecture.name, "no video found on lecture page");
            return;
        }
    };
    lecture.resources.push(Resource {
        url: src,
        name: "Video".to_string(),
        filename: "video.mp4".to_string(),
        ext: "mp4".to_string(),
    });

    for track in document.select(&track_sel) {
        let lang = track.value().attr("srclang").unwrap_or_default();
        let src = match track.value().attr("src").and_then(clean_url) {
            Some(src) => src,
            None => continue,
        };
        lecture.resources.push(Resource {
            url: src,
            name: format!("Subtitles {lang}"),
            filename: format!("Subtitles {lang}.srt"),
            ext: "srt".to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lecture() -> Lecture {
        Lecture {
            name: "Lecture 1".to_string(),
            resources: Vec::new(),
        }
    }

    fn player_page(tracks: &[&str]) -> String {
        let tracks: String = tracks
            .iter()
            .map(|lang| {
                format!(
                    "<track kind=\"subtitles\" srclang=\"{lang}\" \
                     src=\"https://class.coursera.org/nlp/lecture/subtitles?q=1_{lang}&format=srt\">"
                )
            })
            .collect();
        format!(
            "<html><body><video>\
             <source type=\"video/mp4\" src=\"https://d396qusza40orc.cloudfront.net/lec1.mp4\">\
             {tracks}</video></body></html>"
        )
    }

    #[test]
    fn test_appends_video_and_subtitles() {
        let mut lecture = lecture();
        append_hidden_resources(&mut lecture, &player_page(&["en", "zh", "pt"]));

        assert_eq!(lecture.resources.len(), 4);
        assert_eq!(lecture.resources[0].filename, "video.mp4");
        assert_eq!(lecture.resources[0].ext, "mp4");
        assert_eq!(lecture.resources[1].name, "Subtitles en");
        assert_eq!(lecture.resources[1].filename, "Subtitles en.srt");
        assert_eq!(lecture.resources[3].ext, "srt");
    }

    #[test]
    fn test_page_without_video_appends_nothing() {
        let mut lecture = lecture();
        append_hidden_resources(
            &mut lecture,
            "<html><body><p>This recording is unavailable.</p></body></html>",
        );
        assert!(lecture.resources.is_empty());
    }
}
