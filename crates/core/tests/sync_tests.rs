//! Full sync passes against scripted consoles.

mod common;

use std::sync::Arc;

use common::{eos_cue_args, eos_show, fast_settings, qlab_ok, qlab_show, ScriptedTransport};
use cuesync_core::{
    sync_eos, sync_qlab, Correlator, Dispatcher, OscArg, ServerAddress, SyncError, Transport,
};
use serde_json::json;

async fn connected(script: common::Script) -> (Arc<ScriptedTransport>, Correlator) {
    let dispatcher = Arc::new(Dispatcher::new());
    let address = ServerAddress::new("127.0.0.1", 9000);
    let transport = ScriptedTransport::new(
        Arc::clone(&dispatcher),
        address.clone(),
        &[address],
        script,
    );

    let runner = Arc::clone(&transport);
    tokio::spawn(async move { runner.run().await });
    while !transport.is_connected() {
        tokio::task::yield_now().await;
    }

    let correlator = Correlator::new(
        transport.clone() as Arc<dyn Transport>,
        dispatcher,
        fast_settings().timeouts(),
    );
    (transport, correlator)
}

#[tokio::test]
async fn test_eos_sync_skips_continuation_parts() {
    let (_transport, correlator) = connected(eos_show()).await;

    let registry = sync_eos(&correlator, 30).await.unwrap();

    assert_eq!(registry.cue_list_count(), 1);
    assert_eq!(registry.cue_count(), 1);

    let list = registry.cue_list("L1").unwrap();
    assert_eq!(list.number, 1);
    assert_eq!(list.label, "Act One");

    let cue = registry.cue("C1").unwrap();
    assert_eq!(cue.cue.number, 1.0);
    assert_eq!(cue.cue.label, "House to half");
    assert_eq!(cue.cue.timecode, Some(5.0));
    assert_eq!(cue.cue_list(), "L1");
    assert!(registry.cue("C1-P1").is_none());

    assert_eq!(correlator.dispatcher().handler_count(), 0);
}

#[tokio::test]
async fn test_eos_sync_without_count_reply_fails() {
    let (_transport, correlator) = connected(Box::new(|_, _| vec![])).await;

    assert!(sync_eos(&correlator, 30).await.is_err());
    assert_eq!(correlator.dispatcher().handler_count(), 0);
}

#[tokio::test]
async fn test_qlab_sync_builds_tree() {
    let (_transport, correlator) = connected(qlab_show()).await;

    let registry = sync_qlab(&correlator, "W1", 30).await.unwrap();

    assert_eq!(registry.len(), 4);
    let roots: Vec<&str> = registry.roots().map(|c| c.uid()).collect();
    assert_eq!(roots, vec!["L"]);

    let list = registry.get("L").unwrap();
    assert_eq!(list.cue.label, "Main Cue List");
    assert_eq!(list.cue.number, 0.0);
    assert_eq!(list.children(), ["A".to_string(), "B".to_string()]);

    let group = registry.get("A").unwrap();
    assert_eq!(group.parent(), Some("L"));
    assert_eq!(group.children(), ["A1".to_string()]);

    let leaf = registry.get("A1").unwrap();
    assert_eq!(leaf.parent(), Some("A"));
    assert_eq!(leaf.cue.number, 1.5);
    assert_eq!(leaf.file_target.as_deref(), Some("/audio/intro.wav"));
    assert_eq!(leaf.duration, 3.5);
    assert_eq!(leaf.cue.timecode, Some(10.0));
    assert_eq!(registry.parent("A1").map(|c| c.uid()), Some("A"));

    assert_eq!(registry.uids(), vec!["L", "A", "A1", "B"]);
}

#[tokio::test]
async fn test_qlab_sync_absorbs_attribute_failures() {
    let (transport, correlator) = connected(qlab_show()).await;

    let registry = sync_qlab(&correlator, "W1", 30).await.unwrap();

    let fade = registry.get("B").unwrap();
    assert_eq!(fade.cue_target_id.as_deref(), Some("A1"));
    assert_eq!(fade.duration, 0.0);
    assert_eq!(fade.pre_wait, 0.0);
    assert_eq!(fade.post_wait, 1.25);
    assert_eq!(fade.file_target, None);
    assert_eq!(fade.cue.timecode, None);

    // File target is only asked for when the cue has one.
    assert_eq!(transport.sent_to("/workspace/W1/cue_id/B/fileTarget"), 0);
    assert_eq!(transport.sent_to("/workspace/W1/cue_id/A1/fileTarget"), 1);
    assert_eq!(correlator.dispatcher().handler_count(), 0);
}

#[tokio::test]
async fn test_qlab_sync_fails_without_cue_lists() {
    let (_transport, correlator) = connected(qlab_show()).await;

    assert!(sync_qlab(&correlator, "W2", 30).await.is_err());
}

/// Two cue lists. The first list's index reply is malformed, list 2 holds a
/// cue that never answers, one without a uid, and one good cue.
fn eos_with_gaps() -> common::Script {
    Box::new(|address, _args| {
        let reply = |address: &str, args: Vec<OscArg>| vec![(address.to_string(), args)];
        match address {
            "/eos/get/cuelist/count" => reply("/eos/out/get/cuelist/count", vec![OscArg::Int(2)]),
            "/eos/get/cuelist/index/0" => reply(
                "/eos/out/get/cuelist/1/list/0/2",
                vec![OscArg::Int(0), OscArg::Int(7)],
            ),
            "/eos/get/cuelist/index/1" => reply(
                "/eos/out/get/cuelist/2/list/1/2",
                vec![
                    OscArg::Int(1),
                    OscArg::String("L2".to_string()),
                    OscArg::String("Act Two".to_string()),
                ],
            ),
            "/eos/get/cue/2/count" => reply("/eos/out/get/cue/2/count", vec![OscArg::Int(3)]),
            "/eos/get/cue/2/index/0" => vec![],
            "/eos/get/cue/2/index/1" => reply(
                "/eos/out/get/cue/2/2/0/list/1/3",
                vec![OscArg::Int(1)],
            ),
            "/eos/get/cue/2/index/2" => reply(
                "/eos/out/get/cue/2/3/0/list/2/3",
                eos_cue_args("C3", "Blackout", "00:01:00:00"),
            ),
            _ => vec![],
        }
    })
}

#[tokio::test]
async fn test_eos_sync_skips_failed_cue_queries() {
    let (transport, correlator) = connected(eos_with_gaps()).await;

    let registry = sync_eos(&correlator, 30).await.unwrap();

    assert_eq!(registry.cue_list_count(), 1);
    assert!(registry.cue_list_by_number(1).is_none());
    assert_eq!(registry.cue_count(), 1);

    let cue = registry.cue("C3").unwrap();
    assert_eq!(cue.cue.number, 3.0);
    assert_eq!(cue.cue.timecode, Some(60.0));
    assert_eq!(cue.cue_list(), "L2");

    // The skipped list never had its cues enumerated.
    assert_eq!(transport.sent_to("/eos/get/cue/1/count"), 0);
    assert_eq!(transport.sent_to("/eos/get/cue/2/index/2"), 1);
    assert_eq!(correlator.dispatcher().handler_count(), 0);
}

#[tokio::test]
async fn test_eos_sync_without_cue_count_fails() {
    let base = eos_show();
    let script: common::Script = Box::new(move |address, args| {
        if address == "/eos/get/cue/1/count" {
            vec![]
        } else {
            base(address, args)
        }
    });
    let (transport, correlator) = connected(script).await;

    let result = sync_eos(&correlator, 30).await;

    assert!(matches!(result, Err(SyncError::Query(_))));
    assert_eq!(transport.sent_to("/eos/get/cue/1/index/0"), 0);
    assert_eq!(correlator.dispatcher().handler_count(), 0);
}

#[tokio::test]
async fn test_qlab_sync_skips_malformed_cue() {
    let base = qlab_show();
    let script: common::Script = Box::new(move |address, args| {
        if address == "/workspace/W1/cueLists" {
            qlab_ok(
                address,
                json!([{
                    "uniqueID": "L",
                    "listName": "Main Cue List",
                    "type": "Cue List",
                    "cues": [
                        {"uniqueID": "A", "number": "1", "name": "Preshow", "type": "Group"},
                        {"number": "9", "name": "Broken", "type": "Audio"}
                    ]
                }]),
            )
        } else {
            base(address, args)
        }
    });
    let (_transport, correlator) = connected(script).await;

    let registry = sync_qlab(&correlator, "W1", 30).await.unwrap();

    assert_eq!(registry.uids(), vec!["L", "A"]);
    assert_eq!(registry.get("A").unwrap().parent(), Some("L"));
}
