//! Frame host abstraction
//!
//! A [`FrameHost`] is whatever actually renders embedded browsing contexts:
//! a browser document, a webview toolkit, or the in-memory
//! [`HeadlessHost`]. Every frame lives in one shared off-screen container
//! owned by the host. None of these calls are fallible; load failures inside
//! the remote content arrive later as frame events.

use parking_lot::Mutex;
use std::sync::Arc;

pub trait FrameHost: Send + 'static {
    /// Opaque handle to a frame element
    type Element: Clone + PartialEq + std::fmt::Debug + Send + Sync + 'static;

    /// Attach the shared frame container to the document
    fn mount_container(&mut self);

    /// Create a frame loading `address` and append it to the container
    fn create_frame(&mut self, url_id: &str, address: &str) -> Self::Element;

    /// Toggle visibility and display together
    fn set_visibility(&mut self, element: &Self::Element, visible: bool);

    /// Reload the frame at `address`
    fn reload(&mut self, element: &Self::Element, address: &str);

    /// Detach the frame element from the document
    fn remove_frame(&mut self, element: &Self::Element);

    /// Detach the container itself
    fn unmount_container(&mut self);
}

/// Identity of a headless frame element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameHandle(u64);

impl FrameHandle {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A frame element in the headless document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessFrame {
    pub handle: FrameHandle,
    pub url_id: String,
    pub address: String,
    pub visible: bool,
    pub reloads: u32,
}

#[derive(Debug, Default)]
struct HeadlessDocument {
    container_mounted: bool,
    container_mounts: u32,
    children: Vec<HeadlessFrame>,
    next_handle: u64,
}

/// In-memory frame host.
///
/// Clones share one document, so a test can keep a clone to inspect the
/// document after handing the host to a mount manager.
#[derive(Debug, Clone, Default)]
pub struct HeadlessHost {
    doc: Arc<Mutex<HeadlessDocument>>,
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_container_mounted(&self) -> bool {
        self.doc.lock().container_mounted
    }

    /// How many times the container has been attached
    pub fn container_mounts(&self) -> u32 {
        self.doc.lock().container_mounts
    }

    /// Frames currently in the container, in insertion order
    pub fn frames(&self) -> Vec<HeadlessFrame> {
        self.doc.lock().children.clone()
    }

    pub fn child_count(&self) -> usize {
        self.doc.lock().children.len()
    }

    pub fn frame(&self, url_id: &str) -> Option<HeadlessFrame> {
        self.doc
            .lock()
            .children
            .iter()
            .find(|f| f.url_id == url_id)
            .cloned()
    }

    pub fn visible_url_ids(&self) -> Vec<String> {
        self.doc
            .lock()
            .children
            .iter()
            .filter(|f| f.visible)
            .map(|f| f.url_id.clone())
            .collect()
    }
}

impl FrameHost for HeadlessHost {
    type Element = FrameHandle;

    fn mount_container(&mut self) {
        let mut doc = self.doc.lock();
        if !doc.container_mounted {
            doc.container_mounted = true;
            doc.container_mounts += 1;
        }
    }

    fn create_frame(&mut self, url_id: &str, address: &str) -> FrameHandle {
        let mut doc = self.doc.lock();
        doc.next_handle += 1;
        let handle = FrameHandle(doc.next_handle);
        doc.children.push(HeadlessFrame {
            handle,
            url_id: url_id.to_string(),
            address: address.to_string(),
            visible: false,
            reloads: 0,
        });
        handle
    }

    fn set_visibility(&mut self, element: &FrameHandle, visible: bool) {
        if let Some(frame) = self
            .doc
            .lock()
            .children
            .iter_mut()
            .find(|f| f.handle == *element)
        {
            frame.visible = visible;
        }
    }

    fn reload(&mut self, element: &FrameHandle, address: &str) {
        if let Some(frame) = self
            .doc
            .lock()
            .children
            .iter_mut()
            .find(|f| f.handle == *element)
        {
            frame.address = address.to_string();
            frame.reloads += 1;
        }
    }

    fn remove_frame(&mut self, element: &FrameHandle) {
        self.doc.lock().children.retain(|f| f.handle != *element);
    }

    fn unmount_container(&mut self) {
        let mut doc = self.doc.lock();
        doc.container_mounted = false;
        doc.children.clear();
    }
}
