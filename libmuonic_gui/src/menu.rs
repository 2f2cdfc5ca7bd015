//! The menu bar as data: titles, entries, shortcuts, and which controller method each
//! entry runs.
use std::fmt::Display;

use super::controller::Controller;
use super::dialogs::Dialog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MenuAction {
    OpenDataFolder,
    Exit,
    ChannelConfiguration,
    Thresholds,
    AdvancedConfigurations,
    Manual,
    DaqCommands,
    TechnicalDocumentation,
    About,
}

/// What the front-end has to do after an action ran
#[derive(Debug, Clone, PartialEq)]
pub enum ActionResponse {
    Done,
    ShowDialog(Dialog),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutKey {
    O,
    Q,
    F1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortcut {
    pub ctrl: bool,
    pub key: ShortcutKey,
}

impl Display for Shortcut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.ctrl {
            write!(f, "Ctrl+")?;
        }
        write!(f, "{:?}", self.key)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MenuEntry {
    pub action: MenuAction,
    pub label: &'static str,
    pub status_tip: &'static str,
    pub shortcut: Option<Shortcut>,
}

#[derive(Debug, Clone, Copy)]
pub struct Menu {
    pub title: &'static str,
    pub entries: &'static [MenuEntry],
}

const fn entry(
    action: MenuAction,
    label: &'static str,
    status_tip: &'static str,
    shortcut: Option<Shortcut>,
) -> MenuEntry {
    MenuEntry {
        action,
        label,
        status_tip,
        shortcut,
    }
}

const fn ctrl(key: ShortcutKey) -> Option<Shortcut> {
    Some(Shortcut { ctrl: true, key })
}

pub static MENUS: [Menu; 3] = [
    Menu {
        title: "File",
        entries: &[
            entry(
                MenuAction::OpenDataFolder,
                "Open Data Folder",
                "Open the folder with the data files",
                ctrl(ShortcutKey::O),
            ),
            entry(MenuAction::Exit, "Exit", "Exit muonic", ctrl(ShortcutKey::Q)),
        ],
    },
    Menu {
        title: "Settings",
        entries: &[
            entry(
                MenuAction::ChannelConfiguration,
                "Channel Configuration",
                "Configure channels, coincidence, and veto",
                None,
            ),
            entry(
                MenuAction::Thresholds,
                "Thresholds",
                "Set the discriminator thresholds",
                None,
            ),
            entry(
                MenuAction::AdvancedConfigurations,
                "Advanced Configurations",
                "Gate width, time window, and DAQ status output",
                None,
            ),
        ],
    },
    Menu {
        title: "Help",
        entries: &[
            entry(
                MenuAction::Manual,
                "Website with Manual",
                "Open the muonic manual in a browser",
                None,
            ),
            entry(
                MenuAction::DaqCommands,
                "DAQ Commands",
                "Show the commands of the DAQ card",
                Some(Shortcut {
                    ctrl: false,
                    key: ShortcutKey::F1,
                }),
            ),
            entry(
                MenuAction::TechnicalDocumentation,
                "Technical documentation",
                "Open the technical documentation in a browser",
                None,
            ),
            entry(
                MenuAction::About,
                "About muonic",
                "Version and source location",
                None,
            ),
        ],
    },
];

type Handler = fn(&mut Controller) -> ActionResponse;

fn show_help(_: &mut Controller) -> ActionResponse {
    ActionResponse::ShowDialog(Dialog::Help)
}

fn show_about(_: &mut Controller) -> ActionResponse {
    ActionResponse::ShowDialog(Dialog::About)
}

fn do_nothing(_: &mut Controller) -> ActionResponse {
    ActionResponse::Done
}

static HANDLERS: [(MenuAction, Handler); 9] = [
    (MenuAction::OpenDataFolder, Controller::open_data_folder),
    (MenuAction::Exit, Controller::request_close),
    (MenuAction::ChannelConfiguration, Controller::open_config_dialog),
    (MenuAction::Thresholds, Controller::open_threshold_dialog),
    (MenuAction::AdvancedConfigurations, Controller::open_advanced_dialog),
    (MenuAction::Manual, Controller::open_manual),
    (MenuAction::DaqCommands, show_help),
    (MenuAction::TechnicalDocumentation, Controller::open_docs),
    (MenuAction::About, show_about),
];

impl MenuAction {
    pub fn handler(self) -> Handler {
        HANDLERS
            .iter()
            .find(|(action, _)| *action == self)
            .map(|(_, handler)| *handler)
            .unwrap_or(do_nothing)
    }
}

/// The entry bound to a shortcut, if any
pub fn action_for_shortcut(shortcut: Shortcut) -> Option<MenuAction> {
    MENUS
        .iter()
        .flat_map(|menu| menu.entries.iter())
        .find(|entry| entry.shortcut == Some(shortcut))
        .map(|entry| entry.action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_entry_has_a_handler() {
        for entry in MENUS.iter().flat_map(|m| m.entries.iter()) {
            assert!(
                HANDLERS.iter().any(|(action, _)| *action == entry.action),
                "{} has no handler",
                entry.label
            );
        }
    }

    #[test]
    fn test_shortcuts() {
        assert_eq!(
            action_for_shortcut(Shortcut {
                ctrl: true,
                key: ShortcutKey::Q
            }),
            Some(MenuAction::Exit)
        );
        assert_eq!(
            action_for_shortcut(Shortcut {
                ctrl: false,
                key: ShortcutKey::F1
            }),
            Some(MenuAction::DaqCommands)
        );
        assert_eq!(
            action_for_shortcut(Shortcut {
                ctrl: false,
                key: ShortcutKey::O
            }),
            None
        );
        assert_eq!(MENUS[0].entries[0].shortcut.unwrap().to_string(), "Ctrl+O");
    }
}
