//! Single-pass Atom parser.
//!
//! The namespace of every element is resolved once by the reader. Structural
//! elements (`feed`, `entry`, `id`, `category`, `updated`, `content`) must be in
//! the Atom namespace or unqualified. Inside `content` the entity reference is
//! free-form, so `Id` and `Uri` are matched by local name at any depth.

use crate::source::{Category, ChangeEvent};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;

pub const ATOM_NAMESPACE: &[u8] = b"http://www.w3.org/2005/Atom";
const UNKNOWN_EVENT_TYPE: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    Feed,
    Entry,
    EntryId,
    Updated,
    Category,
    Content,
    ContentId,
    ContentUri,
    InContent,
    Other,
}

#[derive(Debug, Default)]
struct EntryDraft {
    id: String,
    term: Option<String>,
    updated: String,
    content_id: Option<String>,
    content_uri: Option<String>,
    pending_id: String,
    pending_uri: String,
}

impl EntryDraft {
    fn finish(self) -> Option<ChangeEvent> {
        let id = self.id.trim();
        if id.is_empty() {
            return None;
        }

        let event_type = self
            .term
            .filter(|term| !term.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_EVENT_TYPE.to_owned());
        let from_uri = self.content_uri.as_deref().map(entity_id_from_uri);
        let entity_id = match Category::from_term(&event_type) {
            Category::EngagementChanged => from_uri.or(self.content_id),
            _ => self.content_id.or(from_uri),
        }
        .unwrap_or_default();
        let timestamp = DateTime::parse_from_rfc3339(self.updated.trim())
            .ok()
            .map(|value| value.with_timezone(&Utc));

        Some(ChangeEvent {
            id: id.to_owned(),
            entity_id,
            event_type,
            timestamp,
        })
    }
}

/// Parses a feed document into change events in document order.
///
/// Entries without an `<id>` are dropped; a missing category yields the
/// `Unknown` event type.
pub fn parse_feed(xml: &str) -> Result<Vec<ChangeEvent>> {
    let mut reader = NsReader::from_str(xml);
    let mut stack: Vec<Node> = Vec::new();
    let mut draft: Option<EntryDraft> = None;
    let mut events = Vec::new();

    loop {
        let (namespace, event) = reader
            .read_resolved_event()
            .context("malformed feed document")?;

        match event {
            Event::Start(start) => {
                let node = classify(stack.last().copied(), &namespace, &start);
                open_node(node, &start, &mut draft)?;
                stack.push(node);
            }
            Event::Empty(start) => {
                let node = classify(stack.last().copied(), &namespace, &start);
                open_node(node, &start, &mut draft)?;
                close_node(node, &mut draft, &mut events);
            }
            Event::End(_) => {
                if let Some(node) = stack.pop() {
                    close_node(node, &mut draft, &mut events);
                }
            }
            Event::Text(text) => {
                let text = text.unescape().context("invalid text in feed document")?;
                append_text(&stack, &mut draft, &text);
            }
            Event::CData(data) => {
                let raw = data.into_inner();
                append_text(&stack, &mut draft, &String::from_utf8_lossy(&raw));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        bail!("feed document ended before all elements were closed");
    }

    Ok(events)
}

/// Extracts the entity id from `…/entities/{id}/engagements` style references.
///
/// Without a path the whole (trimmed) value is returned.
pub fn entity_id_from_uri(uri: &str) -> String {
    let trimmed = uri.trim().trim_end_matches('/');
    let without_suffix = trimmed.strip_suffix("/engagements").unwrap_or(trimmed);
    without_suffix
        .rsplit('/')
        .next()
        .unwrap_or(without_suffix)
        .to_owned()
}

fn classify(parent: Option<Node>, namespace: &ResolveResult, start: &BytesStart) -> Node {
    let local_name = start.local_name();
    let local = local_name.as_ref();
    let atom = match namespace {
        ResolveResult::Unbound => true,
        ResolveResult::Bound(Namespace(ns)) => *ns == ATOM_NAMESPACE,
        ResolveResult::Unknown(_) => false,
    };

    match parent {
        None if atom && local == b"feed" => Node::Feed,
        None | Some(Node::Feed) if atom && local == b"entry" => Node::Entry,
        Some(Node::Entry) if atom => match local {
            b"id" => Node::EntryId,
            b"updated" => Node::Updated,
            b"category" => Node::Category,
            b"content" => Node::Content,
            _ => Node::Other,
        },
        Some(Node::Content | Node::ContentId | Node::ContentUri | Node::InContent) => match local {
            b"Id" => Node::ContentId,
            b"Uri" => Node::ContentUri,
            _ => Node::InContent,
        },
        _ => Node::Other,
    }
}

fn open_node(node: Node, start: &BytesStart, draft: &mut Option<EntryDraft>) -> Result<()> {
    match node {
        Node::Entry => *draft = Some(EntryDraft::default()),
        Node::Category => {
            let term = start
                .try_get_attribute("term")
                .context("invalid category attributes")?;
            if let (Some(term), Some(draft)) = (term, draft.as_mut()) {
                let value = term
                    .unescape_value()
                    .context("invalid category term")?;
                draft.term.get_or_insert_with(|| value.trim().to_owned());
            }
        }
        Node::ContentId => {
            if let Some(draft) = draft.as_mut() {
                draft.pending_id.clear();
            }
        }
        Node::ContentUri => {
            if let Some(draft) = draft.as_mut() {
                draft.pending_uri.clear();
            }
        }
        _ => {}
    }
    Ok(())
}

fn close_node(node: Node, draft: &mut Option<EntryDraft>, events: &mut Vec<ChangeEvent>) {
    match node {
        Node::Entry => {
            if let Some(event) = draft.take().and_then(EntryDraft::finish) {
                events.push(event);
            }
        }
        Node::ContentId => {
            if let Some(draft) = draft.as_mut() {
                let value = draft.pending_id.trim();
                if draft.content_id.is_none() && !value.is_empty() {
                    draft.content_id = Some(value.to_owned());
                }
            }
        }
        Node::ContentUri => {
            if let Some(draft) = draft.as_mut() {
                let value = draft.pending_uri.trim();
                if draft.content_uri.is_none() && !value.is_empty() {
                    draft.content_uri = Some(value.to_owned());
                }
            }
        }
        _ => {}
    }
}

fn append_text(stack: &[Node], draft: &mut Option<EntryDraft>, text: &str) {
    let Some(draft) = draft.as_mut() else {
        return;
    };

    // Nested wrappers such as `<Id><value>…</value></Id>` attribute their text
    // to the closest capturing ancestor.
    for node in stack.iter().rev() {
        let target = match node {
            Node::EntryId => &mut draft.id,
            Node::Updated => &mut draft.updated,
            Node::ContentId => &mut draft.pending_id,
            Node::ContentUri => &mut draft.pending_uri,
            Node::InContent => continue,
            _ => return,
        };
        target.push_str(text);
        return;
    }
}
