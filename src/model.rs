//! The authoritative in-memory view of pages, buttons, and the active page.
//!
//! Readers (widget scheduler, rendering) take lock-free snapshots from the
//! arc-swap; every mutation goes through the single writer lock, persists to
//! disk, and reports whether it touched the active page so the caller can
//! request a re-render.

use crate::config;
use crate::config::schema::{ButtonConfig, Config, Page};
use crate::error::{DeckError, Result};
use arc_swap::ArcSwap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

pub struct PageModel {
    config: ArcSwap<Config>,
    /// Serializes all mutations; reads never take it.
    writer: Mutex<()>,
    path: PathBuf,
}

impl PageModel {
    pub fn new(config: Config, path: PathBuf) -> Self {
        Self {
            config: ArcSwap::from_pointee(config),
            writer: Mutex::new(()),
            path,
        }
    }

    /// Lock-free snapshot of the full config.
    pub fn snapshot(&self) -> Arc<Config> {
        self.config.load_full()
    }

    pub fn active_index(&self) -> usize {
        self.config.load().current_page
    }

    pub fn page_count(&self) -> usize {
        self.config.load().pages.len()
    }

    pub fn brightness(&self) -> u8 {
        self.config.load().brightness
    }

    /// Replace the whole config (hot reload). Does not write back to disk;
    /// the file is already the source of this snapshot.
    pub fn replace(&self, new: Arc<Config>) {
        let _guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        self.config.store(new);
    }

    /// Switch to an absolute page index. Out-of-range is a no-op.
    /// Returns true if the active page changed.
    pub fn go_to_page(&self, index: usize) -> bool {
        self.mutate(|config| {
            if index >= config.pages.len() || config.current_page == index {
                return Ok(false);
            }
            info!("page {} -> {index}", config.current_page);
            config.current_page = index;
            Ok(true)
        })
        .unwrap_or(false)
    }

    /// Advance to the next page, wrapping past the end.
    pub fn next_page(&self) -> usize {
        self.mutate(|config| {
            config.current_page = (config.current_page + 1) % config.pages.len();
            Ok(config.current_page)
        })
        .unwrap_or_else(|_| self.active_index())
    }

    /// Go back one page, wrapping before the start.
    pub fn prev_page(&self) -> usize {
        self.mutate(|config| {
            let count = config.pages.len();
            config.current_page = (config.current_page + count - 1) % count;
            Ok(config.current_page)
        })
        .unwrap_or_else(|_| self.active_index())
    }

    /// Replace one button. Returns true if the mutation touched the
    /// active page.
    pub fn update_button(&self, page_index: usize, key: u8, button: ButtonConfig) -> Result<bool> {
        self.mutate(|config| {
            let active = config.current_page;
            let page = config
                .pages
                .get_mut(page_index)
                .ok_or_else(|| DeckError::Config(format!("no page {page_index}")))?;
            page.buttons.insert(key.to_string(), button);
            Ok(page_index == active)
        })
    }

    /// Append an empty page. Returns its index.
    pub fn add_page(&self, name: &str) -> Result<usize> {
        self.mutate(|config| {
            config.pages.push(Page::empty(name));
            Ok(config.pages.len() - 1)
        })
    }

    /// Delete a page. Rejected when it is the only one; deleting the active
    /// page clamps the active index to the last valid page.
    pub fn delete_page(&self, index: usize) -> Result<bool> {
        self.mutate(|config| {
            if config.pages.len() <= 1 {
                return Err(DeckError::Config(
                    "cannot delete the last page".to_string(),
                ));
            }
            if index >= config.pages.len() {
                return Err(DeckError::Config(format!("no page {index}")));
            }
            let was_active = config.current_page == index;
            config.pages.remove(index);
            if config.current_page >= config.pages.len() {
                config.current_page = config.pages.len() - 1;
            }
            Ok(was_active)
        })
    }

    pub fn rename_page(&self, index: usize, name: &str) -> Result<()> {
        self.mutate(|config| {
            let page = config
                .pages
                .get_mut(index)
                .ok_or_else(|| DeckError::Config(format!("no page {index}")))?;
            page.name = name.to_string();
            Ok(())
        })
    }

    /// Reset every button on a page to empty, keeping the page name.
    /// Returns true if the cleared page is active.
    pub fn clear_page_buttons(&self, index: usize) -> Result<bool> {
        self.mutate(|config| {
            let active = config.current_page;
            let page = config
                .pages
                .get_mut(index)
                .ok_or_else(|| DeckError::Config(format!("no page {index}")))?;
            let name = page.name.clone();
            *page = Page::empty(&name);
            Ok(index == active)
        })
    }

    pub fn set_brightness(&self, percent: u8) -> Result<()> {
        self.mutate(|config| {
            config.brightness = percent.min(100);
            Ok(())
        })
    }

    /// Clone-mutate-store under the writer lock, then persist.
    fn mutate<T>(&self, f: impl FnOnce(&mut Config) -> Result<T>) -> Result<T> {
        let _guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let mut next = Config::clone(&self.config.load());
        let out = f(&mut next)?;
        self.config.store(Arc::new(next));

        if let Err(e) = config::save(&self.path, &self.config.load()) {
            // A lost write never takes the model down; the file catches up
            // on the next mutation.
            warn!("failed to persist config: {e}");
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> PageModel {
        let path = std::env::temp_dir()
            .join("crtdeck-model-test")
            .join(format!("{}.json", std::process::id()));
        PageModel::new(Config::starter(), path)
    }

    #[test]
    fn go_to_page_sets_active() {
        let m = model();
        m.add_page("Two").unwrap();
        m.add_page("Three").unwrap();

        assert!(m.go_to_page(2));
        assert_eq!(m.active_index(), 2);

        // Out of range is a no-op.
        assert!(!m.go_to_page(9));
        assert_eq!(m.active_index(), 2);
    }

    #[test]
    fn next_page_wraps_to_zero() {
        let m = model();
        m.add_page("Two").unwrap();
        m.go_to_page(1);
        assert_eq!(m.next_page(), 0);
    }

    #[test]
    fn prev_page_wraps_to_last() {
        let m = model();
        m.add_page("Two").unwrap();
        m.add_page("Three").unwrap();
        assert_eq!(m.active_index(), 0);
        assert_eq!(m.prev_page(), 2);
    }

    #[test]
    fn delete_last_page_rejected() {
        let m = model();
        assert!(m.delete_page(0).is_err());
        assert_eq!(m.page_count(), 1);
    }

    #[test]
    fn delete_active_page_clamps_index() {
        let m = model();
        m.add_page("Two").unwrap();
        m.add_page("Three").unwrap();
        m.go_to_page(2);

        assert!(m.delete_page(2).unwrap());
        assert_eq!(m.active_index(), 1);
        assert_eq!(m.page_count(), 2);
    }

    #[test]
    fn clear_page_keeps_name() {
        let m = model();
        m.rename_page(0, "Streaming").unwrap();
        let touched = m.clear_page_buttons(0).unwrap();
        assert!(touched);

        let snap = m.snapshot();
        assert_eq!(snap.pages[0].name, "Streaming");
        assert!(snap.pages[0].button(5).unwrap().is_blank());
    }

    #[test]
    fn update_button_reports_active_touch() {
        let m = model();
        m.add_page("Two").unwrap();

        let mut btn = ButtonConfig::empty();
        btn.command = "__CLOCK__".to_string();
        assert!(m.update_button(0, 1, btn.clone()).unwrap());
        assert!(!m.update_button(1, 1, btn).unwrap());
    }
}
