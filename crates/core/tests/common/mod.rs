//! In-memory console doubles shared by the scenario tests.

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use cuesync_core::{
    AddressPrompt, Dispatcher, OscArg, ServerAddress, Settings, Transport, TransportError,
};

/// Outbound address and args in, replies (address, args) out.
pub type Script = Box<dyn Fn(&str, &[OscArg]) -> Vec<(String, Vec<OscArg>)> + Send + Sync>;

/// A transport that answers queries from a script, synchronously, through
/// the dispatcher it was built with.
pub struct ScriptedTransport {
    dispatcher: Arc<Dispatcher>,
    address: Mutex<ServerAddress>,
    reachable: HashSet<ServerAddress>,
    connected: AtomicBool,
    running: AtomicUsize,
    script: Script,
    sent: Mutex<Vec<(String, Vec<OscArg>)>>,
}

impl ScriptedTransport {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        address: ServerAddress,
        reachable: &[ServerAddress],
        script: Script,
    ) -> Arc<Self> {
        Arc::new(Self {
            dispatcher,
            address: Mutex::new(address),
            reachable: reachable.iter().cloned().collect(),
            connected: AtomicBool::new(false),
            running: AtomicUsize::new(0),
            script,
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn sent(&self) -> Vec<(String, Vec<OscArg>)> {
        self.sent.lock().clone()
    }

    pub fn sent_to(&self, address: &str) -> usize {
        self.sent.lock().iter().filter(|(a, _)| a == address).count()
    }

    /// Receive loops currently alive.
    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }
}

/// Counts one live receive loop until dropped, including by abort.
struct RunningLoop<'a>(&'a AtomicUsize);

impl<'a> RunningLoop<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for RunningLoop<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, address: &str, args: Vec<OscArg>) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        let replies = (self.script)(address, &args);
        self.sent.lock().push((address.to_string(), args));

        for (reply_address, reply_args) in replies {
            self.dispatcher.dispatch(&reply_address, &reply_args);
        }
        Ok(())
    }

    async fn run(&self) -> Result<(), TransportError> {
        let address = self.server_address();
        if !self.reachable.contains(&address) {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("{} refused", address),
            )));
        }

        let _running = RunningLoop::enter(&self.running);
        self.connected.store(true, Ordering::SeqCst);
        std::future::pending::<()>().await;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn set_server_address(&self, address: ServerAddress) {
        self.connected.store(false, Ordering::SeqCst);
        *self.address.lock() = address;
    }

    fn server_address(&self) -> ServerAddress {
        self.address.lock().clone()
    }
}

/// Hands out queued answers, then gives up.
pub struct QueuedPrompt {
    answers: Mutex<VecDeque<Option<ServerAddress>>>,
    calls: AtomicUsize,
}

impl QueuedPrompt {
    pub fn new(answers: Vec<Option<ServerAddress>>) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.into()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AddressPrompt for QueuedPrompt {
    async fn prompt_for_new_address(&self, _current: &ServerAddress) -> Option<ServerAddress> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answers.lock().pop_front().flatten()
    }
}

/// Settings with short waits so failure paths finish quickly.
pub fn fast_settings() -> Settings {
    Settings {
        query_timeout_ms: 50,
        busy_timeout_ms: 200,
        busy_poll_interval_ms: 5,
        connect_settle_ms: 20,
        ..Settings::default()
    }
}

pub fn qlab_ok(query: &str, data: Value) -> Vec<(String, Vec<OscArg>)> {
    vec![(
        format!("/reply{}", query),
        vec![OscArg::String(json!({"status": "ok", "data": data}).to_string())],
    )]
}

pub fn qlab_error(query: &str) -> Vec<(String, Vec<OscArg>)> {
    vec![(
        format!("/reply{}", query),
        vec![OscArg::String(json!({"status": "error"}).to_string())],
    )]
}

/// Workspace `W1` holding one cue list `L` with cues `A` (a group holding
/// `A1`) and `B`.
///
/// `B` never answers its duration query and reports an error for its
/// pre-wait.
pub fn qlab_show() -> Script {
    Box::new(|address, _args| {
        let prefix = "/workspace/W1/cue_id/";
        if let Some(rest) = address.strip_prefix(prefix) {
            let (uid, attribute) = rest.split_once('/').unwrap_or((rest, ""));
            let data = match (uid, attribute) {
                ("A1", "hasFileTargets") => json!(true),
                ("A1", "fileTarget") => json!("/audio/intro.wav"),
                ("A1", "duration") => json!(3.5),
                ("A1", "timecodeTrigger") => json!("00:00:10:00"),
                ("B", "hasCueTargets") => json!(1),
                ("B", "cueTargetId") => json!("A1"),
                ("B", "duration") => return vec![],
                ("B", "preWait") => return qlab_error(address),
                ("B", "postWait") => json!("1.25"),
                (_, "hasFileTargets" | "hasCueTargets") => json!(false),
                (_, "timecodeTrigger") => json!(""),
                _ => json!(0),
            };
            return qlab_ok(address, data);
        }

        match address {
            "/workspaces" => qlab_ok(
                address,
                json!([{"uniqueID": "W1", "displayName": "Opening Night"}]),
            ),
            "/workspace/W1/connect" => qlab_ok(address, json!("ok")),
            "/workspace/W1/cueLists" => qlab_ok(
                address,
                json!([{
                    "uniqueID": "L",
                    "number": "",
                    "name": "",
                    "listName": "Main Cue List",
                    "type": "Cue List",
                    "cues": [
                        {
                            "uniqueID": "A",
                            "number": "1",
                            "name": "Preshow",
                            "type": "Group",
                            "cues": [
                                {"uniqueID": "A1", "number": "1.5", "name": "Walk-in music", "type": "Audio"}
                            ]
                        },
                        {"uniqueID": "B", "number": 2, "name": "Fade out", "type": "Fade"}
                    ]
                }]),
            ),
            _ => vec![],
        }
    })
}

pub fn eos_cue_args(uid: &str, label: &str, timecode: &str) -> Vec<OscArg> {
    let mut args = vec![OscArg::Int(0); 26];
    args[1] = OscArg::String(uid.to_string());
    args[2] = OscArg::String(label.to_string());
    args[25] = OscArg::String(timecode.to_string());
    args
}

/// Cue list 1 (`L1`) holding cue 1 part 0 (`C1`, 00:00:05:00 at 30 fps) and
/// a continuation part 1.
pub fn eos_show() -> Script {
    Box::new(|address, _args| match address {
        "/eos/get/cuelist/count" => vec![(
            "/eos/out/get/cuelist/count".to_string(),
            vec![OscArg::Int(1)],
        )],
        "/eos/get/cuelist/index/0" => vec![(
            "/eos/out/get/cuelist/1/list/0/1".to_string(),
            vec![
                OscArg::Int(0),
                OscArg::String("L1".to_string()),
                OscArg::String("Act One".to_string()),
            ],
        )],
        "/eos/get/cue/1/count" => vec![(
            "/eos/out/get/cue/1/count".to_string(),
            vec![OscArg::Int(2)],
        )],
        "/eos/get/cue/1/index/0" => vec![(
            "/eos/out/get/cue/1/1/0/list/0/2".to_string(),
            eos_cue_args("C1", "House to half", "00:00:05:00"),
        )],
        "/eos/get/cue/1/index/1" => vec![(
            "/eos/out/get/cue/1/1/1/list/1/2".to_string(),
            eos_cue_args("C1-P1", "Follow spot", "00:00:06:00"),
        )],
        _ => vec![],
    })
}
