use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use log::{debug, info};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::api::NodeApi;
use crate::config::AppConfig;
use crate::crypto::signer::WalletIdentity;
use crate::dashboard::{InputEvent, RedrawHandle};
use crate::lifecycle::{SharedStatus, WalletLifecycle, WalletStatus};

/// Dashboard cursor: which wallet is highlighted and which page is shown.
/// Owned by the input-handling path; the renderer reads copies.
#[derive(Debug, Clone, Copy)]
pub struct ViewState {
    pub selected: usize,
    pub page: usize,
    pub page_size: usize,
}

impl ViewState {
    pub fn new(page_size: usize) -> Self {
        Self {
            selected: 0,
            page: 0,
            page_size: page_size.max(1),
        }
    }

    pub fn total_pages(&self, total: usize) -> usize {
        if total == 0 {
            1
        } else {
            (total + self.page_size - 1) / self.page_size
        }
    }

    /// Half-open index range of the wallets on the current page.
    pub fn page_bounds(&self, total: usize) -> (usize, usize) {
        let start = self.page * self.page_size;
        (start, (start + self.page_size).min(total))
    }

    /// Move the selection up within the current page. No-op at the top.
    pub fn move_up(&mut self, total: usize) -> bool {
        let (start, _) = self.page_bounds(total);
        if self.selected > start {
            self.selected -= 1;
            true
        } else {
            false
        }
    }

    /// Move the selection down within the current page. No-op at the bottom.
    pub fn move_down(&mut self, total: usize) -> bool {
        let (_, end) = self.page_bounds(total);
        if end > 0 && self.selected < end - 1 {
            self.selected += 1;
            true
        } else {
            false
        }
    }

    /// Previous page, selection reset to its first row. No-op on page 0.
    pub fn page_left(&mut self) -> bool {
        if self.page > 0 {
            self.page -= 1;
            self.selected = self.page * self.page_size;
            true
        } else {
            false
        }
    }

    /// Next page, selection reset to its first row. No-op on the last page.
    pub fn page_right(&mut self, total: usize) -> bool {
        if self.page + 1 < self.total_pages(total) {
            self.page += 1;
            self.selected = self.page * self.page_size;
            true
        } else {
            false
        }
    }
}

/// One wallet's row in a dashboard frame.
#[derive(Debug, Clone)]
pub struct WalletRow {
    pub address: String,
    pub status: WalletStatus,
}

/// Everything the renderer needs for one frame.
#[derive(Debug, Clone)]
pub struct DashboardSnapshot {
    pub rows: Vec<WalletRow>,
    pub view: ViewState,
}

/// Shared registry of per-wallet status cells plus the view cursor.
/// Statuses are single-writer (each wallet's task) / multi-reader; the
/// view is written only via the input path.
pub struct StatusBoard {
    order: Vec<String>,
    statuses: HashMap<String, SharedStatus>,
    view: RwLock<ViewState>,
}

impl StatusBoard {
    fn new(addresses: Vec<String>, page_size: usize) -> Self {
        let statuses = addresses
            .iter()
            .map(|address| {
                (
                    address.clone(),
                    Arc::new(RwLock::new(WalletStatus::starting())),
                )
            })
            .collect();
        Self {
            order: addresses,
            statuses,
            view: RwLock::new(ViewState::new(page_size)),
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    fn status_of(&self, address: &str) -> Option<SharedStatus> {
        self.statuses.get(address).cloned()
    }

    /// Snapshot every wallet row in startup order plus the current view.
    pub fn snapshot(&self) -> DashboardSnapshot {
        let rows = self
            .order
            .iter()
            .filter_map(|address| {
                let cell = self.statuses.get(address)?;
                let status = cell.read().ok()?.clone();
                Some(WalletRow {
                    address: address.clone(),
                    status,
                })
            })
            .collect();
        let view = self
            .view
            .read()
            .map(|view| *view)
            .unwrap_or_else(|_| ViewState::new(1));
        DashboardSnapshot { rows, view }
    }

    fn update_view(&self, apply: impl FnOnce(&mut ViewState, usize) -> bool) -> bool {
        let total = self.len();
        match self.view.write() {
            Ok(mut view) => apply(&mut view, total),
            Err(_) => false,
        }
    }
}

/// Owns the wallet fleet: one lifecycle task per wallet, the shared status
/// board, and the shutdown signal that stops everything.
pub struct Supervisor<C: NodeApi + 'static> {
    cfg: Arc<AppConfig>,
    client: Arc<C>,
    board: Arc<StatusBoard>,
    pending: Vec<WalletIdentity>,
    tasks: HashMap<String, JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    redraw: RedrawHandle,
}

impl<C: NodeApi + 'static> Supervisor<C> {
    pub fn new(
        cfg: Arc<AppConfig>,
        client: Arc<C>,
        identities: Vec<WalletIdentity>,
        redraw: RedrawHandle,
    ) -> Self {
        let addresses = identities
            .iter()
            .map(|identity| identity.address().to_string())
            .collect();
        let board = Arc::new(StatusBoard::new(addresses, cfg.page_size));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            cfg,
            client,
            board,
            pending: identities,
            tasks: HashMap::new(),
            shutdown_tx,
            shutdown_rx,
            redraw,
        }
    }

    pub fn board(&self) -> Arc<StatusBoard> {
        self.board.clone()
    }

    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// Launch one lifecycle task per configured wallet. Tasks are isolated;
    /// one wallet failing never touches the others.
    pub fn start(&mut self) {
        for identity in self.pending.drain(..) {
            let address = identity.address().to_string();
            let Some(status) = self.board.status_of(&address) else {
                continue;
            };
            let lifecycle = WalletLifecycle::new(
                identity,
                self.client.clone(),
                self.cfg.clone(),
                status,
                self.redraw.clone(),
                self.shutdown_rx.clone(),
            );
            info!("[{}] launching lifecycle task", address);
            self.tasks.insert(address, tokio::spawn(lifecycle.run()));
        }
        self.redraw.request();
    }

    /// Apply a navigation key to the view. Out-of-bounds moves are no-ops.
    pub fn handle_input(&self, event: InputEvent) {
        let changed = match event {
            InputEvent::Up => self.board.update_view(|view, total| view.move_up(total)),
            InputEvent::Down => self.board.update_view(|view, total| view.move_down(total)),
            InputEvent::PageLeft => self.board.update_view(|view, _| view.page_left()),
            InputEvent::PageRight => self
                .board
                .update_view(|view, total| view.page_right(total)),
            InputEvent::Quit => false,
        };
        if changed {
            self.redraw.request();
        }
    }

    /// Stop every per-wallet timer. In-flight HTTP calls are abandoned.
    pub async fn shutdown(&mut self) {
        // Send cannot fail while the supervisor holds its own receiver.
        let _ = self.shutdown_tx.send(true);
        for (address, handle) in self.tasks.drain() {
            handle.abort();
            if handle.await.is_err() {
                debug!("[{}] lifecycle task aborted", address);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, WalletDetails};
    use tokio::sync::mpsc;

    fn view(page: usize, selected: usize) -> ViewState {
        ViewState {
            selected,
            page,
            page_size: 5,
        }
    }

    #[test]
    fn test_page_bounds_for_last_partial_page() {
        // 12 wallets, page size 5: page 2 holds indices 10 and 11 only.
        let state = view(2, 10);
        assert_eq!(state.page_bounds(12), (10, 12));
        assert_eq!(state.total_pages(12), 3);
    }

    #[test]
    fn test_page_right_stops_at_last_page() {
        let mut state = view(2, 10);
        assert!(!state.page_right(12));
        assert_eq!(state.page, 2);
    }

    #[test]
    fn test_page_left_stops_at_first_page() {
        let mut state = view(0, 3);
        assert!(!state.page_left());
        assert_eq!(state.page, 0);
        assert_eq!(state.selected, 3);
    }

    #[test]
    fn test_page_change_resets_selection() {
        let mut state = view(0, 3);
        assert!(state.page_right(12));
        assert_eq!(state.page, 1);
        assert_eq!(state.selected, 5);

        assert!(state.page_left());
        assert_eq!(state.page, 0);
        assert_eq!(state.selected, 0);
    }

    #[test]
    fn test_selection_clamped_to_page() {
        let mut state = view(0, 0);
        assert!(!state.move_up(12));
        for _ in 0..10 {
            state.move_down(12);
        }
        // Never leaves the first page.
        assert_eq!(state.selected, 4);

        let mut last = view(2, 11);
        assert!(!last.move_down(12));
        assert_eq!(last.selected, 11);
    }

    #[test]
    fn test_board_snapshot_preserves_order() {
        let addresses: Vec<String> = (0..3).map(|i| format!("0xwallet{}", i)).collect();
        let board = StatusBoard::new(addresses.clone(), 5);
        let snapshot = board.snapshot();
        let got: Vec<&str> = snapshot.rows.iter().map(|r| r.address.as_str()).collect();
        assert_eq!(got, addresses.iter().map(String::as_str).collect::<Vec<_>>());
    }

    struct IdleNode;

    #[async_trait::async_trait]
    impl NodeApi for IdleNode {
        async fn node_status(&self, _address: &str) -> Result<bool, ApiError> {
            Ok(true)
        }

        async fn wallet_details(&self, _address: &str) -> Result<WalletDetails, ApiError> {
            Ok(WalletDetails::default())
        }

        async fn activate_node(
            &self,
            _address: &str,
            _signature: &str,
            _timestamp: i64,
        ) -> Result<(), ApiError> {
            Ok(())
        }

        async fn claim_daily_points(
            &self,
            _address: &str,
            _signature: &str,
            _timestamp: i64,
        ) -> Result<bool, ApiError> {
            Ok(false)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_spawns_one_task_per_wallet() {
        let keys = [
            "0x0000000000000000000000000000000000000000000000000000000000000001",
            "0x0000000000000000000000000000000000000000000000000000000000000002",
        ];
        let identities: Vec<WalletIdentity> = keys
            .iter()
            .map(|key| WalletIdentity::from_private_key(key).unwrap())
            .collect();

        let (redraw_tx, _redraw_rx) = mpsc::unbounded_channel();
        let mut supervisor = Supervisor::new(
            Arc::new(AppConfig::default()),
            Arc::new(IdleNode),
            identities,
            RedrawHandle::new(redraw_tx),
        );

        assert_eq!(supervisor.board().len(), 2);
        supervisor.start();
        assert_eq!(supervisor.tasks.len(), 2);

        supervisor.shutdown().await;
        assert!(supervisor.tasks.is_empty());
    }
}
