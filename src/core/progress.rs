use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// 目前正在處理的頁碼，0 代表閒置
///
/// 每個 fetcher 各自持有一份；clone 後共享同一個值，可在另一個 task 讀取。
/// 讀到的值僅供參考，可能已過時。
#[derive(Debug, Clone, Default)]
pub struct FetchProgress {
    current_page: Arc<AtomicU32>,
}

impl FetchProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_page(&self) -> u32 {
        self.current_page.load(Ordering::Relaxed)
    }

    pub fn is_idle(&self) -> bool {
        self.current_page() == 0
    }

    pub(crate) fn set_page(&self, page: u32) {
        self.current_page.store(page, Ordering::Relaxed);
    }

    pub(crate) fn reset(&self) {
        self.current_page.store(0, Ordering::Relaxed);
    }

    /// 離開 scope 時自動歸零，錯誤或取消時也一樣
    pub(crate) fn track(&self) -> ProgressGuard<'_> {
        ProgressGuard { progress: self }
    }
}

pub(crate) struct ProgressGuard<'a> {
    progress: &'a FetchProgress,
}

impl ProgressGuard<'_> {
    pub(crate) fn set_page(&self, page: u32) {
        self.progress.set_page(page);
    }
}

impl Drop for ProgressGuard<'_> {
    fn drop(&mut self) {
        self.progress.reset();
    }
}
