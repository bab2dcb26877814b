//! Lighting console enumeration.
//!
//! The console has no tree query. Cue lists and cues are walked by index,
//! and each indexed reply echoes identity in its address:
//!
//! - `/eos/out/get/cuelist/{list}/list/{index}/{count}`
//! - `/eos/out/get/cue/{list}/{cue}/{part}/list/{index}/{count}`

use super::reply::{self, AttributeValue};
use crate::cue::{Cue, EosCue, EosCueList, EosRegistry};
use crate::error::{ParseError, SyncError};
use crate::osc::{Correlator, Reply};
use crate::timecode;

const CUE_LIST_REPLY_PREFIX: &str = "/eos/out/get/cuelist/";
const CUE_REPLY_PREFIX: &str = "/eos/out/get/cue/";

/// Payload offsets of a cue list reply.
const CUE_LIST_UID_ARG: usize = 1;
const CUE_LIST_LABEL_ARG: usize = 2;

/// Payload offsets of a cue reply.
const CUE_UID_ARG: usize = 1;
const CUE_LABEL_ARG: usize = 2;
const CUE_TIMECODE_ARG: usize = 25;

/// Identity of one cue list, read from an indexed reply.
#[derive(Debug, Clone, PartialEq)]
pub struct CueListIdentity {
    pub uid: String,
    pub number: u32,
    pub label: String,
}

impl CueListIdentity {
    pub fn parse(reply: &Reply) -> Result<Self, ParseError> {
        let segments = address_segments(reply, CUE_LIST_REPLY_PREFIX, 4)?;
        let number = segments[0].parse::<u32>().map_err(|_| {
            ParseError::new(&reply.address, format!("bad list number {:?}", segments[0]))
        })?;

        Ok(Self {
            uid: reply::positional_text(reply, CUE_LIST_UID_ARG, "uid")?,
            number,
            label: reply::positional(reply, CUE_LIST_LABEL_ARG)
                .as_text()
                .unwrap_or_default()
                .to_string(),
        })
    }
}

/// Identity of one cue part, read from an indexed reply.
#[derive(Debug, Clone, PartialEq)]
pub struct CueIdentity {
    pub uid: String,
    pub number: f64,
    /// Zero for the primary part, non-zero for multi-part continuations.
    pub part: u32,
    pub label: String,
    pub timecode_text: String,
}

impl CueIdentity {
    pub fn parse(reply: &Reply) -> Result<Self, ParseError> {
        let segments = address_segments(reply, CUE_REPLY_PREFIX, 6)?;
        let number = AttributeValue::Text(segments[1].to_string())
            .as_f64()
            .ok_or_else(|| {
                ParseError::new(&reply.address, format!("bad cue number {:?}", segments[1]))
            })?;
        let part = segments[2].parse::<u32>().map_err(|_| {
            ParseError::new(&reply.address, format!("bad part number {:?}", segments[2]))
        })?;

        Ok(Self {
            uid: reply::positional_text(reply, CUE_UID_ARG, "uid")?,
            number,
            part,
            label: reply::positional(reply, CUE_LABEL_ARG)
                .as_text()
                .unwrap_or_default()
                .to_string(),
            timecode_text: reply::positional(reply, CUE_TIMECODE_ARG)
                .as_text()
                .unwrap_or_default()
                .to_string(),
        })
    }

    pub fn is_primary_part(&self) -> bool {
        self.part == 0
    }

    pub fn into_cue(self, fps: u32) -> EosCue {
        let timecode = timecode::decode_remote(&self.timecode_text, fps);
        EosCue::new(Cue::new(self.uid, self.number, self.label).with_timecode(timecode))
    }
}

/// Path segments after `prefix`, which must number exactly `expected` and
/// carry the `list` marker third from the end.
fn address_segments<'a>(
    reply: &'a Reply,
    prefix: &str,
    expected: usize,
) -> Result<Vec<&'a str>, ParseError> {
    let rest = reply
        .address
        .strip_prefix(prefix)
        .ok_or_else(|| ParseError::new(&reply.address, "unexpected reply address"))?;
    let segments: Vec<&str> = rest.split('/').collect();

    if segments.len() != expected || segments[expected - 3] != "list" {
        return Err(ParseError::new(
            &reply.address,
            "unexpected reply address layout",
        ));
    }
    Ok(segments)
}

async fn query_count(correlator: &Correlator, query: &str, response: &str) -> Result<u32, SyncError> {
    let reply = correlator.query(query, response, vec![]).await?;
    Ok(reply::count(&reply)?)
}

/// Rebuild the lighting console's cue lists from scratch.
///
/// A count that cannot be read aborts the pass. A cue list or cue whose
/// indexed query fails is logged and skipped.
pub async fn sync_eos(correlator: &Correlator, fps: u32) -> Result<EosRegistry, SyncError> {
    let list_count = query_count(
        correlator,
        "/eos/get/cuelist/count",
        "/eos/out/get/cuelist/count",
    )
    .await
    .inspect_err(|e| log::error!("Cannot read cue list count: {}", e))?;

    let mut registry = EosRegistry::new();

    for list_index in 0..list_count {
        let Some(identity) = fetch_cue_list(correlator, list_index).await else {
            continue;
        };
        let list_uid = identity.uid.clone();
        let list_number = identity.number;

        if let Err(e) = registry.add_cue_list(EosCueList::new(
            identity.uid,
            identity.number,
            identity.label,
        )) {
            log::warn!("Skipping cue list {}: {}", list_number, e);
            continue;
        }

        let cue_count = query_count(
            correlator,
            &format!("/eos/get/cue/{}/count", list_number),
            &format!("/eos/out/get/cue/{}/count", list_number),
        )
        .await
        .inspect_err(|e| log::error!("Cannot read cue count of list {}: {}", list_number, e))?;

        for cue_index in 0..cue_count {
            let Some(identity) = fetch_cue(correlator, list_number, cue_index).await else {
                continue;
            };

            if !identity.is_primary_part() {
                log::debug!(
                    "Skipping part {} of cue {}/{}",
                    identity.part,
                    list_number,
                    identity.number
                );
                continue;
            }

            let uid = identity.uid.clone();
            if let Err(e) = registry.add_cue(&list_uid, identity.into_cue(fps)) {
                log::warn!("Skipping cue {}: {}", uid, e);
            }
        }
    }

    log::info!(
        "Synchronized {} cues in {} cue lists from the lighting console",
        registry.cue_count(),
        registry.cue_list_count()
    );
    Ok(registry)
}

async fn fetch_cue_list(correlator: &Correlator, index: u32) -> Option<CueListIdentity> {
    let result = correlator
        .query(
            &format!("/eos/get/cuelist/index/{}", index),
            &format!("/eos/out/get/cuelist/*/list/{}/*", index),
            vec![],
        )
        .await
        .map_err(SyncError::from)
        .and_then(|reply| Ok(CueListIdentity::parse(&reply)?));

    result
        .inspect_err(|e| log::warn!("Skipping cue list at index {}: {}", index, e))
        .ok()
}

async fn fetch_cue(correlator: &Correlator, list_number: u32, index: u32) -> Option<CueIdentity> {
    let result = correlator
        .query(
            &format!("/eos/get/cue/{}/index/{}", list_number, index),
            &format!("/eos/out/get/cue/{}/*/*/list/{}/*", list_number, index),
            vec![],
        )
        .await
        .map_err(SyncError::from)
        .and_then(|reply| Ok(CueIdentity::parse(&reply)?));

    result
        .inspect_err(|e| {
            log::warn!(
                "Skipping cue at index {} of list {}: {}",
                index,
                list_number,
                e
            )
        })
        .ok()
}
