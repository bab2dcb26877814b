use std::collections::HashMap;

use crate::timecode;

/// Fields every console cue carries.
#[derive(Clone, Debug, PartialEq)]
pub struct Cue {
    /// Console-assigned id, unique within that console.
    pub uid: String,
    /// Ordering key. Consoles allow fractional numbers such as `1.5`.
    pub number: f64,
    pub label: String,
    /// Trigger time in seconds. `None` when the console reports no usable
    /// timecode; zero is a real timecode, never a placeholder.
    pub timecode: Option<f64>,
}

impl Cue {
    pub fn new(uid: impl Into<String>, number: f64, label: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            number,
            label: label.into(),
            timecode: None,
        }
    }

    pub fn with_timecode(mut self, timecode: Option<f64>) -> Self {
        self.timecode = timecode.filter(|t| t.is_finite() && *t >= 0.0);
        self
    }

    /// The timecode as `HH:MM:SS:FF`, if there is one.
    pub fn timecode_string(&self, fps: u32) -> Option<String> {
        self.timecode
            .and_then(|seconds| timecode::encode(seconds, fps).ok())
    }
}

/// A cue on the audio/video cue engine. Group cues and cue lists own
/// nested children; links are stored as uids and kept consistent by
/// [`QlabRegistry`](super::QlabRegistry).
#[derive(Clone, Debug, PartialEq)]
pub struct QlabCue {
    pub cue: Cue,
    /// Console category, e.g. `Audio`, `Group`, `Video`, `Cue List`.
    pub cue_type: String,
    pub duration: f64,
    pub pre_wait: f64,
    pub post_wait: f64,
    pub file_target: Option<String>,
    /// Set only when the cue redirects to another cue.
    pub cue_target_id: Option<String>,
    pub(crate) parent: Option<String>,
    pub(crate) children: Vec<String>,
}

impl QlabCue {
    pub fn new(cue: Cue, cue_type: impl Into<String>) -> Self {
        Self {
            cue,
            cue_type: cue_type.into(),
            duration: 0.0,
            pre_wait: 0.0,
            post_wait: 0.0,
            file_target: None,
            cue_target_id: None,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn uid(&self) -> &str {
        &self.cue.uid
    }

    /// Uid of the owning cue, `None` for roots.
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Uids of nested cues in console order.
    pub fn children(&self) -> &[String] {
        &self.children
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// A cue on the lighting console.
#[derive(Clone, Debug, PartialEq)]
pub struct EosCue {
    pub cue: Cue,
    pub(crate) cue_list: String,
}

impl EosCue {
    pub fn new(cue: Cue) -> Self {
        Self {
            cue,
            cue_list: String::new(),
        }
    }

    pub fn uid(&self) -> &str {
        &self.cue.uid
    }

    /// Uid of the cue list that holds this cue.
    pub fn cue_list(&self) -> &str {
        &self.cue_list
    }
}

/// A lighting console cue list and the cues it holds, keyed by uid.
#[derive(Clone, Debug, PartialEq)]
pub struct EosCueList {
    pub uid: String,
    /// List number as known to the console.
    pub number: u32,
    pub label: String,
    pub(crate) cues: HashMap<String, EosCue>,
}

impl EosCueList {
    pub fn new(uid: impl Into<String>, number: u32, label: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            number,
            label: label.into(),
            cues: HashMap::new(),
        }
    }

    pub fn cue(&self, uid: &str) -> Option<&EosCue> {
        self.cues.get(uid)
    }

    pub fn cues(&self) -> impl Iterator<Item = &EosCue> {
        self.cues.values()
    }

    /// Cues ordered by cue number.
    pub fn sorted_cues(&self) -> Vec<&EosCue> {
        let mut cues: Vec<&EosCue> = self.cues.values().collect();
        cues.sort_by(|a, b| a.cue.number.total_cmp(&b.cue.number));
        cues
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }
}
