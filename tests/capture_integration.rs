//! Capture pipeline integration tests.
//!
//! Drives negotiation and persistence the way the watch loop does, with
//! in-memory offers standing in for the compositor:
//! - Mime precedence and partial-retrieval degradation
//! - Hand-off over a channel to the capture service
//! - Dedup of repeated selections

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use stashd::models::{ClipBody, ClipPayload, NewClip};
use stashd::services::{CaptureService, ContentNegotiator, PayloadSource};
use stashd::storage::ClipStore;
use stashd::Error;
use std::collections::HashMap;
use std::io;
use std::sync::mpsc;
use std::thread;
use test_case::test_case;

// ============================================================================
// Test Helpers
// ============================================================================

/// An offer with fixed payloads; mimes without a payload fail to transfer.
struct StaticOffer {
    mimes: Vec<String>,
    payloads: HashMap<String, Vec<u8>>,
}

impl StaticOffer {
    fn new(offered: &[(&str, Option<&[u8]>)]) -> Self {
        Self {
            mimes: offered.iter().map(|(m, _)| (*m).to_string()).collect(),
            payloads: offered
                .iter()
                .filter_map(|(m, p)| p.map(|p| ((*m).to_string(), p.to_vec())))
                .collect(),
        }
    }
}

impl PayloadSource for StaticOffer {
    fn mime_types(&self) -> &[String] {
        &self.mimes
    }

    fn fetch(&mut self, mime: &str) -> io::Result<Vec<u8>> {
        self.payloads
            .get(mime)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "source went away"))
    }
}

fn negotiate(offered: &[(&str, Option<&[u8]>)]) -> stashd::Result<NewClip> {
    ContentNegotiator::new().negotiate(&mut StaticOffer::new(offered))
}

// ============================================================================
// Negotiation
// ============================================================================

#[test_case(&["text/html", "image/png", "text/plain"], "image/png"; "image beats text")]
#[test_case(&["text/plain", "text/html"], "text/plain"; "plain beats html")]
#[test_case(&["text/html", "text/plain;charset=utf-8", "text/plain"], "text/plain;charset=utf-8"; "utf8 plain first")]
#[test_case(&["image/gif", "image/jpeg"], "image/jpeg"; "jpeg beats gif")]
fn test_primary_precedence(offered: &[&str], expected: &str) {
    let offered: Vec<(&str, Option<&[u8]>)> =
        offered.iter().map(|m| (*m, Some(&b"payload"[..]))).collect();
    assert_eq!(negotiate(&offered).unwrap().mime, expected);
}

#[test]
fn test_empty_offer_rejected() {
    let err = negotiate(&[]).unwrap_err();
    assert_eq!(err.to_string(), "negotiation failed: no suitable mime types");
}

#[test]
fn test_image_with_caption_and_source() {
    let clip = negotiate(&[
        ("image/png", Some(&[0x89, b'P', b'N', b'G'][..])),
        ("text/plain", Some(&b"a cat"[..])),
        ("chromium/x-source-url", Some(&b" https://cats.example/1 \n"[..])),
    ])
    .unwrap();

    assert_eq!(clip.body, ClipBody::Binary(vec![0x89, b'P', b'N', b'G']));
    assert_eq!(clip.metadata.as_deref(), Some("a cat"));
    assert_eq!(clip.url.as_deref(), Some("https://cats.example/1"));
}

#[test]
fn test_failed_url_transfer_degrades_clip() {
    let clip = negotiate(&[
        ("text/plain", Some(&b"  body  "[..])),
        ("text/x-moz-url", None),
    ])
    .unwrap();
    assert_eq!(clip.text_payload(), Some("body"));
    assert_eq!(clip.url, None);
}

#[test]
fn test_failed_image_transfer_degrades_to_caption() {
    let clip = negotiate(&[("image/png", None), ("text/plain", Some(&b"x"[..]))]).unwrap();
    assert_eq!(clip.mime, "text/plain");
    assert_eq!(clip.body, ClipBody::Text("x".to_string()));
}

#[test]
fn test_failed_text_transfer_keeps_source_url() {
    let clip = negotiate(&[
        ("text/plain", None),
        ("chromium/x-source-url", Some(&b"https://example.org/page"[..])),
    ])
    .unwrap();
    assert_eq!(clip.body, ClipBody::Text(String::new()));
    assert_eq!(clip.url.as_deref(), Some("https://example.org/page"));
}

#[test]
fn test_nothing_retrievable_is_fatal() {
    let err = negotiate(&[("text/plain", None), ("text/x-moz-url", None)]).unwrap_err();
    assert!(matches!(err, Error::Negotiation(_)));
}

// ============================================================================
// Hand-off and persistence
// ============================================================================

#[test]
fn test_negotiated_clips_flow_to_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = ClipStore::open(dir.path()).unwrap();
    let (sink, clips) = mpsc::channel();

    let producer = thread::spawn(move || {
        let offers: [&[(&str, Option<&[u8]>)]; 4] = [
            &[("text/plain", Some(&b"first copy"[..]))],
            &[("image/png", Some(&[1, 2, 3][..])), ("text/plain", Some(&b"tiny"[..]))],
            &[("text/plain", Some(&b"first copy"[..]))],
            &[("application/x-unknown", Some(&b"?"[..]))],
        ];
        for offered in offers {
            match negotiate(offered) {
                Ok(clip) => sink.send(clip).unwrap(),
                Err(e) => assert!(matches!(e, Error::Negotiation(_))),
            }
        }
    });

    let stats = CaptureService::new(&store, 16).run(&clips);
    producer.join().unwrap();

    assert_eq!(stats.received, 3);
    assert_eq!(stats.stored, 2);
    assert_eq!(stats.duplicates, 1);
    assert_eq!(stats.failed, 0);

    let recent = store.list_recent(10).unwrap();
    assert_eq!(recent.len(), 2);
    assert!(matches!(recent[0].payload, ClipPayload::Blob(_)));
    assert_eq!(recent[0].metadata.as_deref(), Some("tiny"));
    assert_eq!(recent[1].text(), Some("first copy"));
}
