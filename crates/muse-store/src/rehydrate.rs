//! Turning stored items back into displayable ones.
//!
//! Display handles never survive a session. On load every item's base64
//! payload is decoded into a fresh handle; an item whose payload cannot be
//! decoded is kept without one.

use crate::error::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use muse_core::{CanvasItem, DisplayHandle, ImageRef};

/// Decode an image payload. Accepts bare base64 or a `data:` URL.
pub fn decode_payload(data: &str) -> Result<Vec<u8>> {
    let encoded = match data.strip_prefix("data:") {
        Some(url) => url.split_once(',').map_or(url, |(_, body)| body),
        None => data,
    };
    Ok(STANDARD.decode(encoded.trim())?)
}

/// Attach a fresh display handle to `image`.
pub fn attach_handle(image: &mut ImageRef) -> Result<()> {
    let bytes = decode_payload(&image.data)?;
    image.handle = Some(DisplayHandle::new(bytes));
    Ok(())
}

/// Prepare loaded items for display.
///
/// Also drops a `view_index` that points past the end of the history.
pub fn rehydrate(mut items: Vec<CanvasItem>) -> Vec<CanvasItem> {
    for item in &mut items {
        item.image.handle = None;
        if let Err(err) = attach_handle(&mut item.image) {
            log::warn!("{}: image payload not restored: {err}", item.id);
        }
        if item.view_index.is_some_and(|i| i >= item.history.len()) {
            log::warn!("{}: stale view index dropped", item.id);
            item.view_index = item.history.len().checked_sub(1);
        }
    }
    log::debug!("rehydrated {} item(s)", items.len());
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use muse_core::{ItemId, Point};

    fn item(name: &str, data: &str) -> CanvasItem {
        CanvasItem::new(
            ItemId::intern(name),
            ImageRef {
                name: "photo.jpg".into(),
                mime_type: "image/jpeg".into(),
                data: data.into(),
                handle: None,
            },
            Point::default(),
            1,
        )
    }

    #[test]
    fn decodes_bare_and_data_url_payloads() {
        assert_eq!(decode_payload("aGk=").unwrap(), b"hi");
        assert_eq!(decode_payload("data:image/jpeg;base64,aGk=").unwrap(), b"hi");
    }

    #[test]
    fn fresh_handles_every_load() {
        let first = rehydrate(vec![item("rh_a", "aGk=")]);
        let second = rehydrate(first.clone());
        let a = first[0].image.handle.as_ref().unwrap();
        let b = second[0].image.handle.as_ref().unwrap();
        assert_eq!(a.bytes(), b"hi");
        assert_ne!(a.serial(), b.serial());
    }

    #[test]
    fn bad_payload_keeps_the_item() {
        let items = rehydrate(vec![item("rh_bad", "%%%"), item("rh_ok", "aGk=")]);
        assert_eq!(items.len(), 2);
        assert!(items[0].image.handle.is_none());
        assert!(items[1].image.handle.is_some());
    }

    #[test]
    fn stale_view_index_is_clamped() {
        let mut stale = item("rh_stale", "aGk=");
        stale.view_index = Some(3);
        let items = rehydrate(vec![stale]);
        assert_eq!(items[0].view_index, None);
    }
}
