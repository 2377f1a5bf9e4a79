// Terminal theme for the edgefleet dashboard.
// Neon-on-dark accents matching the CLI banner.

use colored::{ColoredString, Colorize};

use crate::lifecycle::WalletState;

pub struct Theme;

impl Theme {
    /// Color for a wallet state label.
    pub fn status(state: WalletState) -> ColoredString {
        let label = state.to_string();
        match state {
            WalletState::Active => label.bright_green(),
            WalletState::Activated => label.bright_cyan(),
            WalletState::Errored => label.bright_red(),
            WalletState::Restarting => label.bright_magenta(),
            WalletState::Starting | WalletState::CheckingStatus | WalletState::Activating => {
                label.bright_yellow()
            }
        }
    }

    /// Section headers ("Configuration:", "Controls:").
    pub fn heading(text: &str) -> ColoredString {
        text.bright_magenta().bold()
    }

    /// Field labels inside a wallet block.
    pub fn label(text: &str) -> ColoredString {
        text.bold()
    }

    /// Field values (points, streak, timestamps).
    pub fn value(text: &str) -> ColoredString {
        text.bright_cyan()
    }

    /// Wallet addresses.
    pub fn address(text: &str) -> ColoredString {
        text.bright_yellow()
    }

    /// Error lines.
    pub fn error(text: &str) -> ColoredString {
        text.bright_red()
    }

    /// Selection marker for the highlighted wallet row.
    pub fn selection(text: &str) -> ColoredString {
        text.bright_cyan().bold()
    }

    /// De-emphasized text (page indicator, hints).
    pub fn dim(text: &str) -> ColoredString {
        text.dimmed()
    }
}

/// Banner printed at the top of every dashboard frame.
pub fn banner() -> String {
    let lines = [
        "╔═══════════════════════════════════════════════════════════╗"
            .bright_magenta()
            .to_string(),
        "║   ███████╗██████╗  ██████╗ ███████╗                       ║"
            .bright_cyan()
            .bold()
            .to_string(),
        "║   ██╔════╝██╔══██╗██╔════╝ ██╔════╝                       ║"
            .bright_cyan()
            .bold()
            .to_string(),
        "║   █████╗  ██║  ██║██║  ███╗█████╗                         ║"
            .bright_cyan()
            .bold()
            .to_string(),
        "║   ██╔══╝  ██║  ██║██║   ██║██╔══╝                         ║"
            .bright_cyan()
            .bold()
            .to_string(),
        "║   ███████╗██████╔╝╚██████╔╝███████╗                       ║"
            .bright_cyan()
            .bold()
            .to_string(),
        "║   ╚══════╝╚═════╝  ╚═════╝ ╚══════╝  F L E E T            ║"
            .bright_cyan()
            .bold()
            .to_string(),
        "║                                                           ║"
            .bright_magenta()
            .to_string(),
        "║        [ LAYEREDGE LIGHT-NODE FLEET DASHBOARD ]           ║"
            .bright_green()
            .to_string(),
        "╚═══════════════════════════════════════════════════════════╝"
            .bright_magenta()
            .to_string(),
    ];
    lines.join("\n")
}
