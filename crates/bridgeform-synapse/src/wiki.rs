//! Wiki publishing and wiki tree copies.

use std::collections::{BTreeMap, HashMap};

use regex::Regex;
use tracing::{debug, info};

use crate::api::SynapseApi;
use crate::error::{Result, SynapseError};
use crate::model::{WikiHeader, WikiPage};

// ============================================================================
// Publishing
// ============================================================================

fn root_header<'a>(owner_id: &str, headers: &'a [WikiHeader]) -> Result<&'a WikiHeader> {
    headers
        .iter()
        .find(|h| h.parent_id.is_none())
        .ok_or_else(|| SynapseError::NoRootWiki {
            owner: owner_id.to_string(),
        })
}

/// Id of the page titled `title` under `owner_id`, creating it below the
/// root page if no page has that title.
pub fn find_or_create_subpage(api: &dyn SynapseApi, owner_id: &str, title: &str) -> Result<String> {
    let headers = api.wiki_headers(owner_id)?;
    let root = root_header(owner_id, &headers)?;
    if let Some(existing) = headers.iter().find(|h| h.title == title) {
        debug!(owner_id, title, wiki_id = %existing.id, "found wiki subpage");
        return Ok(existing.id.clone());
    }

    let page = WikiPage {
        title: title.to_string(),
        parent_wiki_id: Some(root.id.clone()),
        ..WikiPage::default()
    };
    let created = api.create_wiki(owner_id, &page)?;
    let id = created
        .id
        .ok_or_else(|| SynapseError::MissingId(title.to_string()))?;
    info!(owner_id, title, wiki_id = %id, "created wiki subpage");
    Ok(id)
}

/// Replace the markdown of the root page (or of `subpage`) with `markdown`.
///
/// With `persist = false` the page is fetched and modified but not written
/// back (the subpage is still created if it did not exist).
pub fn publish(
    api: &dyn SynapseApi,
    owner_id: &str,
    subpage: Option<&str>,
    markdown: &str,
    persist: bool,
) -> Result<WikiPage> {
    let mut page = match subpage {
        Some(title) => {
            let wiki_id = find_or_create_subpage(api, owner_id, title)?;
            api.get_wiki(owner_id, Some(&wiki_id))?
        }
        None => api.get_wiki(owner_id, None)?,
    };
    page.markdown = markdown.to_string();
    if !persist {
        return Ok(page);
    }
    let stored = api.update_wiki(owner_id, &page)?;
    info!(owner_id, wiki_id = ?stored.id, bytes = markdown.len(), "published wiki markdown");
    Ok(stored)
}

// ============================================================================
// Copying
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct WikiCopyRequest {
    pub source_id: String,
    pub destination_id: String,
    /// Copy only this page and its descendants; it becomes the destination root.
    pub source_sub_page: Option<String>,
    /// Literal replacements applied to every copied page (e.g. placeholder → entity id).
    pub entity_map: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiCopyReport {
    /// `(source wiki id, destination wiki id)` in copy order.
    pub pages: Vec<(String, String)>,
}

impl WikiCopyReport {
    pub fn destination_root(&self) -> Option<&str> {
        self.pages.first().map(|(_, new)| new.as_str())
    }
}

/// Pages to copy, parents first.
fn select_subtree(headers: &[WikiHeader], start: &str) -> Vec<WikiHeader> {
    let mut children: HashMap<&str, Vec<&WikiHeader>> = HashMap::new();
    for header in headers {
        if let Some(parent) = header.parent_id.as_deref() {
            children.entry(parent).or_default().push(header);
        }
    }
    let mut out = Vec::new();
    let mut stack: Vec<&WikiHeader> = headers.iter().filter(|h| h.id == start).collect();
    while let Some(header) = stack.pop() {
        out.push(header.clone());
        if let Some(kids) = children.get(header.id.as_str()) {
            stack.extend(kids.iter().rev());
        }
    }
    out
}

/// Point links at the copied pages and apply the entity map.
pub fn rewrite_markdown(
    markdown: &str,
    source_id: &str,
    destination_id: &str,
    id_map: &HashMap<String, String>,
    entity_map: &BTreeMap<String, String>,
) -> Result<String> {
    let links = Regex::new(&format!(r"{}/wiki/(\d+)", regex::escape(source_id)))?;
    let mut out = links
        .replace_all(markdown, |caps: &regex::Captures<'_>| {
            let old = &caps[1];
            let new = id_map.get(old).map(String::as_str).unwrap_or(old);
            format!("{destination_id}/wiki/{new}")
        })
        .into_owned();
    for (from, to) in entity_map {
        out = out.replace(from.as_str(), to);
    }
    Ok(out)
}

/// Wiki headers of `owner_id`, empty when the entity has no wiki.
fn headers_or_empty(api: &dyn SynapseApi, owner_id: &str) -> Result<Vec<WikiHeader>> {
    match api.wiki_headers(owner_id) {
        Ok(headers) => Ok(headers),
        Err(err) if err.is_not_found() => Ok(Vec::new()),
        Err(err) => Err(err),
    }
}

/// Create `page` under `owner_id`, or overwrite the page already in its slot:
/// the root page for a root copy, otherwise the sibling with the same title.
fn store_page(
    api: &dyn SynapseApi,
    owner_id: &str,
    existing: &[WikiHeader],
    page: WikiPage,
) -> Result<WikiPage> {
    let slot = existing.iter().find(|h| match &page.parent_wiki_id {
        None => h.parent_id.is_none(),
        Some(parent) => h.parent_id.as_ref() == Some(parent) && h.title == page.title,
    });
    let Some(slot) = slot else {
        return api.create_wiki(owner_id, &page);
    };
    let mut current = api.get_wiki(owner_id, Some(&slot.id))?;
    current.title = page.title;
    current.markdown = page.markdown;
    current.attachment_file_handle_ids = page.attachment_file_handle_ids;
    debug!(owner_id, wiki_id = %slot.id, "overwriting existing wiki page");
    api.update_wiki(owner_id, &current)
}

/// Copy a wiki tree from one entity to another, attachments included.
///
/// Pages already present at the destination (its root, or a same-titled
/// child of a copied parent) are overwritten in place. A source without a
/// wiki copies nothing.
pub fn copy_wiki(api: &dyn SynapseApi, request: &WikiCopyRequest) -> Result<WikiCopyReport> {
    let source = request.source_id.as_str();
    let destination = request.destination_id.as_str();
    let headers = headers_or_empty(api, source)?;
    if headers.is_empty() {
        info!(source, "source has no wiki, nothing to copy");
        return Ok(WikiCopyReport { pages: Vec::new() });
    }
    let start = match &request.source_sub_page {
        Some(id) => id.clone(),
        None => root_header(source, &headers)?.id.clone(),
    };
    let selected = select_subtree(&headers, &start);
    if selected.is_empty() {
        return Err(SynapseError::WikiNotFound {
            owner: source.to_string(),
            wiki_id: start,
        });
    }
    let existing = headers_or_empty(api, destination)?;

    let mut id_map: HashMap<String, String> = HashMap::new();
    let mut copies: Vec<(String, WikiPage)> = Vec::with_capacity(selected.len());
    for header in &selected {
        let original = api.get_wiki(source, Some(&header.id))?;
        let attachments = api.copy_wiki_attachments(&header.id, &original.attachment_file_handle_ids)?;
        let parent_wiki_id = if header.id == start {
            None
        } else {
            header
                .parent_id
                .as_ref()
                .and_then(|p| id_map.get(p))
                .cloned()
        };
        let page = WikiPage {
            title: original.title.clone(),
            markdown: original.markdown.clone(),
            parent_wiki_id,
            attachment_file_handle_ids: attachments,
            ..WikiPage::default()
        };
        let stored = store_page(api, destination, &existing, page)?;
        let new_id = stored
            .id
            .clone()
            .ok_or_else(|| SynapseError::MissingId(stored.title.clone()))?;
        debug!(source, old_id = %header.id, new_id = %new_id, "copied wiki page");
        id_map.insert(header.id.clone(), new_id.clone());
        copies.push((header.id.clone(), stored));
    }

    for (_, page) in &mut copies {
        let rewritten = rewrite_markdown(&page.markdown, source, destination, &id_map, &request.entity_map)?;
        if rewritten != page.markdown {
            page.markdown = rewritten;
            *page = api.update_wiki(destination, page)?;
        }
    }

    let pages: Vec<(String, String)> = copies
        .into_iter()
        .map(|(old, page)| (old, page.id.unwrap_or_default()))
        .collect();
    info!(source, destination, pages = pages.len(), "copied wiki");
    Ok(WikiCopyReport { pages })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemorySynapse;

    fn page(title: &str, markdown: &str, parent: Option<&str>) -> WikiPage {
        WikiPage {
            title: title.to_string(),
            markdown: markdown.to_string(),
            parent_wiki_id: parent.map(str::to_string),
            ..WikiPage::default()
        }
    }

    fn with_root(synapse: &InMemorySynapse, owner: &str) -> String {
        synapse
            .create_wiki(owner, &page("Home", "welcome", None))
            .unwrap()
            .id
            .unwrap()
    }

    #[test]
    fn subpage_is_created_once() {
        let synapse = InMemorySynapse::new();
        let root = with_root(&synapse, "syn1");
        let first = find_or_create_subpage(&synapse, "syn1", "Activity").unwrap();
        let second = find_or_create_subpage(&synapse, "syn1", "Activity").unwrap();
        assert_eq!(first, second);
        let pages = synapse.wiki_pages("syn1");
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].parent_wiki_id.as_deref(), Some(root.as_str()));
    }

    #[test]
    fn subpage_requires_existing_wiki() {
        let synapse = InMemorySynapse::new();
        let err = find_or_create_subpage(&synapse, "syn3", "x").unwrap_err();
        assert!(err.is_not_found());
        assert!(synapse.wiki_pages("syn3").is_empty());
    }

    #[test]
    fn publish_root_without_persist_leaves_platform_untouched() {
        let synapse = InMemorySynapse::new();
        with_root(&synapse, "syn1");
        let page = publish(&synapse, "syn1", None, "{row}", false).unwrap();
        assert_eq!(page.markdown, "{row}");
        assert_eq!(synapse.wiki_pages("syn1")[0].markdown, "welcome");
    }

    #[test]
    fn publish_subpage_persists() {
        let synapse = InMemorySynapse::new();
        with_root(&synapse, "syn1");
        let stored = publish(&synapse, "syn1", Some("Dashboard"), "new body", true).unwrap();
        let pages = synapse.wiki_pages("syn1");
        let dashboard = pages.iter().find(|p| p.title == "Dashboard").unwrap();
        assert_eq!(dashboard.markdown, "new body");
        assert_eq!(stored.id, dashboard.id);
    }

    #[test]
    fn links_and_entity_placeholders_are_rewritten() {
        let id_map: HashMap<String, String> = [("620218".to_string(), "7001".to_string())].into();
        let entity_map: BTreeMap<String, String> =
            [("source_table".to_string(), "syn55".to_string())].into();
        let md = "[a](#!Synapse:syn26546076/wiki/620218) [b](#!Synapse:syn26546076/wiki/999) \
                  ${plot?query=select * from source_table}";
        let out = rewrite_markdown(md, "syn26546076", "syn1", &id_map, &entity_map).unwrap();
        assert_eq!(
            out,
            "[a](#!Synapse:syn1/wiki/7001) [b](#!Synapse:syn1/wiki/999) \
             ${plot?query=select * from syn55}"
        );
    }

    #[test]
    fn copy_sub_tree_becomes_destination_root() {
        let synapse = InMemorySynapse::new();
        let root = with_root(&synapse, "syn10");
        let dashboard = synapse
            .create_wiki(
                "syn10",
                &WikiPage {
                    attachment_file_handle_ids: vec!["fh-orig".to_string()],
                    ..page("Dashboard", "table source_table", Some(&root))
                },
            )
            .unwrap()
            .id
            .unwrap();
        let detail = synapse
            .create_wiki(
                "syn10",
                &page("Detail", &format!("back to syn10/wiki/{dashboard}"), Some(&dashboard)),
            )
            .unwrap()
            .id
            .unwrap();
        synapse
            .create_wiki("syn10", &page("Unrelated", "", Some(&root)))
            .unwrap();

        let request = WikiCopyRequest {
            source_id: "syn10".to_string(),
            destination_id: "syn20".to_string(),
            source_sub_page: Some(dashboard.clone()),
            entity_map: [("source_table".to_string(), "syn99".to_string())].into(),
        };
        let report = copy_wiki(&synapse, &request).unwrap();
        assert_eq!(report.pages.len(), 2);
        assert_eq!(report.pages[0].0, dashboard);
        assert_eq!(report.pages[1].0, detail);

        let copied = synapse.wiki_pages("syn20");
        assert_eq!(copied.len(), 2);
        assert_eq!(copied[0].parent_wiki_id, None);
        assert_eq!(copied[0].markdown, "table syn99");
        assert_eq!(copied[0].attachment_file_handle_ids.len(), 1);
        assert_ne!(copied[0].attachment_file_handle_ids[0], "fh-orig");
        assert_eq!(copied[1].parent_wiki_id, copied[0].id);
        assert_eq!(
            copied[1].markdown,
            format!("back to syn20/wiki/{}", copied[0].id.as_deref().unwrap())
        );
    }

    #[test]
    fn missing_sub_page_is_reported() {
        let synapse = InMemorySynapse::new();
        with_root(&synapse, "syn10");
        let request = WikiCopyRequest {
            source_id: "syn10".to_string(),
            destination_id: "syn20".to_string(),
            source_sub_page: Some("404".to_string()),
            ..WikiCopyRequest::default()
        };
        assert!(matches!(
            copy_wiki(&synapse, &request),
            Err(SynapseError::WikiNotFound { .. })
        ));
    }

    #[test]
    fn copy_overwrites_existing_destination_root() {
        let synapse = InMemorySynapse::new();
        let root = with_root(&synapse, "syn10");
        synapse
            .create_wiki("syn10", &page("Detail", "detail body", Some(&root)))
            .unwrap();
        let old_root = synapse
            .create_wiki("syn20", &page("Old home", "stale", None))
            .unwrap()
            .id
            .unwrap();
        let request = WikiCopyRequest {
            source_id: "syn10".to_string(),
            destination_id: "syn20".to_string(),
            ..WikiCopyRequest::default()
        };

        let first = copy_wiki(&synapse, &request).unwrap();
        assert_eq!(first.destination_root(), Some(old_root.as_str()));
        let pages = synapse.wiki_pages("syn20");
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].title, "Home");
        assert_eq!(pages[0].markdown, "welcome");

        let second = copy_wiki(&synapse, &request).unwrap();
        assert_eq!(second, first);
        assert_eq!(synapse.wiki_pages("syn20").len(), 2);
    }

    #[test]
    fn source_without_wiki_copies_nothing() {
        let synapse = InMemorySynapse::new();
        let request = WikiCopyRequest {
            source_id: "syn10".to_string(),
            destination_id: "syn20".to_string(),
            ..WikiCopyRequest::default()
        };
        let report = copy_wiki(&synapse, &request).unwrap();
        assert!(report.pages.is_empty());
        assert_eq!(report.destination_root(), None);
        assert!(synapse.wiki_pages("syn20").is_empty());
    }
}
