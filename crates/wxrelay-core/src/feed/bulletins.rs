//! Special-weather-tip bulletin feed.
//!
//! `POST <url>` with one `bulletinCodes=<code>` form field per tracked code
//! returns:
//! ```xml
//! <bulletinList>
//!   <BulletinSubmit>
//!     <id>42</id><bullCode>MHEAD_C</bullCode><bullName>Special Weather Tips</bullName>
//!     <creationTime class="sql-timestamp">2025-07-28 15:27:50.0</creationTime>
//!     <submitContent>PE1IRUFEX0M+Li4uPC9NSEVBRF9DPg==</submitContent>
//!   </BulletinSubmit>
//! </bulletinList>
//! ```
//! `submitContent` is base64 of `<MHEAD_C><msg><MsgContent>..</MsgContent></msg>*</MHEAD_C>`.

use async_trait::async_trait;
use base64::Engine as _;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{read_body, SourceFeed};
use crate::error::FetchError;
use crate::types::{RecordPayload, TrackedRecord};

const BULLETIN_ROOT: &str = "bulletinList";
const TIP_CONTENT: &[u8] = b"MsgContent";
const BULLETIN_COLOR: &str = "orange";

#[derive(Debug, Default, Deserialize)]
struct BulletinList {
    #[serde(rename = "BulletinSubmit", default)]
    submits: Vec<BulletinSubmit>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct BulletinSubmit {
    id: String,
    bull_code: String,
    bull_name: String,
    submit_content: String,
    send_time: String,
    created_by: String,
    last_updated_by: String,
    creation_time: TextNode,
}

/// Element that may carry attributes around its text.
#[derive(Debug, Default, Deserialize)]
struct TextNode {
    #[serde(rename = "$text", default)]
    value: String,
}

pub struct BulletinFeed {
    client: reqwest::Client,
    url: String,
    codes: Vec<String>,
}

impl BulletinFeed {
    pub fn new(client: reqwest::Client, url: impl Into<String>, codes: Vec<String>) -> Self {
        Self {
            client,
            url: url.into(),
            codes,
        }
    }
}

#[async_trait]
impl SourceFeed for BulletinFeed {
    async fn fetch(&self) -> Result<Vec<TrackedRecord>, FetchError> {
        let form: Vec<(&str, &str)> = self
            .codes
            .iter()
            .map(|code| ("bulletinCodes", code.as_str()))
            .collect();
        let response = self.client.post(&self.url).form(&form).send().await?;
        let body = read_body(response).await?;
        let records = parse_bulletin_list(&body)?;
        info!(fetched = records.len(), "bulletin batch fetched");
        Ok(records)
    }
}

/// Name of the first element in `xml`, if any.
fn root_name(xml: &str) -> Result<Option<String>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => {
                return Ok(Some(String::from_utf8_lossy(e.name().as_ref()).into_owned()))
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// Parse the outer list. A missing `bulletinList` root is a shape error;
/// bulletins that fail to decode are dropped.
pub fn parse_bulletin_list(xml: &str) -> Result<Vec<TrackedRecord>, FetchError> {
    let root = root_name(xml).map_err(|e| FetchError::Decode(e.to_string()))?;
    if root.as_deref() != Some(BULLETIN_ROOT) {
        return Err(FetchError::Shape(format!(
            "expected <{BULLETIN_ROOT}> root, found {}",
            root.map_or_else(|| "empty document".to_string(), |r| format!("<{r}>"))
        )));
    }

    let list: BulletinList =
        quick_xml::de::from_str(xml).map_err(|e| FetchError::Decode(e.to_string()))?;

    let mut records = Vec::with_capacity(list.submits.len());
    for submit in list.submits {
        match bulletin_record(submit) {
            Ok(Some(record)) => records.push(record),
            Ok(None) => {}
            Err(reason) => warn!(%reason, "dropping malformed bulletin"),
        }
    }
    Ok(records)
}

fn bulletin_record(submit: BulletinSubmit) -> Result<Option<TrackedRecord>, String> {
    let code = submit.bull_code.trim().to_string();
    if code.is_empty() {
        return Err("missing bullCode".to_string());
    }
    let sequence_id = submit
        .id
        .trim()
        .parse::<u64>()
        .map_err(|_| format!("{code}: non-numeric id '{}'", submit.id))?;

    let tips = decode_tips(&submit.submit_content, &code)?;
    if tips.is_empty() {
        debug!(code = %code, sequence_id, "bulletin has no tip content");
        return Ok(None);
    }

    let mut record = TrackedRecord::new(code.clone(), sequence_id);
    let creation = submit.creation_time.value.trim();
    record.creation_time = (!creation.is_empty()).then(|| creation.to_string());
    let send_time = submit.send_time.trim();
    record.active_time = (!send_time.is_empty()).then(|| send_time.to_string());
    record.created_by = submit.created_by;
    record.last_updated_by = submit.last_updated_by;
    record.payload = RecordPayload {
        title: if submit.bull_name.trim().is_empty() {
            code
        } else {
            submit.bull_name.trim().to_string()
        },
        body: tips.join("\n"),
        icon: None,
        color: BULLETIN_COLOR.to_string(),
    };
    Ok(Some(record))
}

/// Base64-decode `content` and collect every non-empty `MsgContent`, in
/// document order.
pub fn decode_tips(content: &str, code: &str) -> Result<Vec<String>, String> {
    let compact: String = content.split_whitespace().collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| format!("{code}: invalid base64: {e}"))?;
    let xml = String::from_utf8(bytes).map_err(|e| format!("{code}: invalid utf-8: {e}"))?;

    let mut reader = Reader::from_str(&xml);
    reader.trim_text(true);

    let mut tips = Vec::new();
    let mut root_seen = false;
    let mut current: Option<String> = None;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name();
                if !root_seen {
                    root_seen = true;
                    if !name.as_ref().eq_ignore_ascii_case(code.as_bytes()) {
                        return Err(format!(
                            "{code}: content root is <{}>",
                            String::from_utf8_lossy(name.as_ref())
                        ));
                    }
                } else if name.as_ref() == TIP_CONTENT {
                    current = Some(String::new());
                }
            }
            Ok(Event::Text(t)) => {
                if let Some(buf) = current.as_mut() {
                    let text = t.unescape().map_err(|e| format!("{code}: {e}"))?;
                    buf.push_str(&text);
                }
            }
            Ok(Event::CData(c)) => {
                if let Some(buf) = current.as_mut() {
                    buf.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == TIP_CONTENT {
                    if let Some(tip) = current.take() {
                        let tip = tip.trim();
                        if !tip.is_empty() {
                            tips.push(tip.to_string());
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(format!("{code}: invalid content xml: {e}")),
        }
    }

    if !root_seen {
        return Err(format!("{code}: empty content"));
    }
    Ok(tips)
}
