//! Board-definition hook: the game CRUD side of the application owns the
//! boards; the engine only reads them.
//!
//! The engine never blocks on a provider — the gateway fetches boards in a
//! spawned task and feeds the result back as a follow-up message.

use diffduel_protocol::GameData;

/// Supplies board definitions to the session engine.
///
/// `Send + Sync + 'static` so fetches can run in spawned tasks while the
/// gateway keeps processing events.
///
/// # Example
///
/// ```rust
/// use diffduel_engine::GameProvider;
/// use diffduel_protocol::{DifferenceMatrix, GameData};
///
/// /// Serves one hard-coded board. Enough for tests and demos.
/// struct OneBoard;
///
/// impl GameProvider for OneBoard {
///     async fn classic_board(&self, name: &str) -> Option<GameData> {
///         (name == "meadow").then(|| GameData {
///             name: "meadow".into(),
///             nb_difference: 1,
///             difficulty: "easy".into(),
///             difference_matrix: DifferenceMatrix(vec![vec![-1, 0]]),
///         })
///     }
///
///     async fn any_board(&self) -> Option<GameData> {
///         self.classic_board("meadow").await
///     }
/// }
/// ```
pub trait GameProvider: Send + Sync + 'static {
    /// Looks up a classic-mode board by name.
    fn classic_board(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Option<GameData>> + Send;

    /// Draws a board for the limited-time pool (initial board and every
    /// `next_game` advance). `None` means the catalogue is empty.
    fn any_board(
        &self,
    ) -> impl std::future::Future<Output = Option<GameData>> + Send;
}
