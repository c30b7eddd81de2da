//! Source post to relay-ready text
//!
//! Pure and order-preserving. Media markers are unique per post (a source
//! platform guarantee), so plain first-occurrence replacement is safe.

use crate::types::{MediaRef, Post};

/// Convert a raw source post into relay-ready text plus the media references
/// that need downloading.
///
/// Every media marker is stripped from the text and its reference queued for
/// download; every shortened link is replaced with its expanded destination.
/// The output contains no marker that was present and resolvable on input.
pub fn transform(post: &Post) -> (String, Vec<MediaRef>) {
    let mut text = post.raw_text.clone();
    let mut to_fetch = Vec::with_capacity(post.media_refs.len());

    for media in &post.media_refs {
        text = text.replacen(&media.text_marker, "", 1);
        to_fetch.push(media.clone());
    }

    for link in &post.link_refs {
        text = text.replacen(&link.short_url, &link.expanded_url, 1);
    }

    // Stripped media markers usually sit at the end of the body.
    (text.trim_end().to_string(), to_fetch)
}
