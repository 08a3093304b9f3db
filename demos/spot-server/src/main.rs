//! A runnable Diffduel server with a hard-coded board catalogue and
//! log-only history storage. Point a WebSocket client at port 8080 and
//! speak the JSON event protocol.

use diffduel::ServerBuilder;
use diffduel_engine::{GameHistory, GameProvider, HistoryError, HistoryStore};
use diffduel_protocol::{DifferenceMatrix, GameData, EMPTY_PIXEL};
use rand::Rng;

// ---------------------------------------------------------------------------
// Board catalogue
// ---------------------------------------------------------------------------

/// Builds an `height × width` matrix with the given difference pixels.
fn matrix(
    width: usize,
    height: usize,
    pixels: &[(usize, usize, i32)],
) -> DifferenceMatrix {
    let mut rows = vec![vec![EMPTY_PIXEL; width]; height];
    for &(x, y, region) in pixels {
        rows[y][x] = region;
    }
    DifferenceMatrix(rows)
}

fn catalogue() -> Vec<GameData> {
    vec![
        GameData {
            name: "meadow".into(),
            nb_difference: 3,
            difficulty: "easy".into(),
            difference_matrix: matrix(
                8,
                8,
                &[(1, 1, 0), (2, 1, 0), (5, 3, 1), (6, 6, 2)],
            ),
        },
        GameData {
            name: "harbor".into(),
            nb_difference: 2,
            difficulty: "hard".into(),
            difference_matrix: matrix(8, 8, &[(0, 7, 0), (4, 4, 1)]),
        },
        GameData {
            name: "rooftops".into(),
            nb_difference: 2,
            difficulty: "hard".into(),
            difference_matrix: matrix(8, 8, &[(3, 0, 0), (7, 2, 1)]),
        },
    ]
}

struct BoardCatalogue {
    boards: Vec<GameData>,
}

impl GameProvider for BoardCatalogue {
    async fn classic_board(&self, name: &str) -> Option<GameData> {
        self.boards.iter().find(|b| b.name == name).cloned()
    }

    async fn any_board(&self) -> Option<GameData> {
        if self.boards.is_empty() {
            return None;
        }
        let idx = rand::rng().random_range(0..self.boards.len());
        Some(self.boards[idx].clone())
    }
}

// ---------------------------------------------------------------------------
// History storage
// ---------------------------------------------------------------------------

/// Logs finished games instead of persisting them.
struct LogHistory;

impl HistoryStore for LogHistory {
    async fn save(&self, history: GameHistory) -> Result<(), HistoryError> {
        tracing::info!(
            game = %history.name,
            mode = %history.game_mode,
            winner = ?history.winner,
            abandoned = ?history.abandoned,
            elapsed_ms = history.timer,
            "game history recorded"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let server = ServerBuilder::new()
        .bind("0.0.0.0:8080")
        .build(BoardCatalogue { boards: catalogue() }, LogHistory)
        .await?;

    tracing::info!(addr = %server.local_addr()?, "spot-server up");
    server.run().await?;
    Ok(())
}
