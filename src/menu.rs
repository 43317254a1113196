//! Menu model construction.
//!
//! `MenuModel::build` turns the configured Makefiles into menu items on a
//! [`MenuBackend`] and keeps a binding table from item id to action. The event
//! loop dispatches clicks through that table, so items from a torn-down model
//! can never fire.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::warn;

use crate::config::Entry;
use crate::launcher;
use crate::targets;

/// Identity of an item on a menu backend. Never reused by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub u64);

/// Operations the core needs from a menu toolkit.
pub trait MenuBackend {
    /// Adds a top-level item.
    fn add_item(&mut self, title: &str, tooltip: &str) -> ItemId;
    /// Adds an item under `parent`, turning `parent` into a submenu.
    fn add_sub_item(&mut self, parent: ItemId, title: &str, tooltip: &str) -> ItemId;
    fn add_separator(&mut self) -> ItemId;
    fn disable(&mut self, id: ItemId);
    fn hide(&mut self, id: ItemId);
    /// Destroys an item and its children. Toolkits without removal hide it.
    fn remove(&mut self, id: ItemId) {
        self.hide(id);
    }
    fn set_title(&mut self, title: &str);
    fn set_tooltip(&mut self, tooltip: &str);
}

/// What a click on a bound item does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuAction {
    /// Run `target` from `makefile` in a terminal.
    Launch { makefile: PathBuf, target: String },
    /// Start the add-entry dialog.
    AddEntry,
    /// Open the configuration file in an editor.
    OpenConfig,
    /// Quit the application.
    Exit,
}

/// Outcome of reading one Makefile during a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupState {
    /// The group holds this many launchable targets.
    Targets(usize),
    /// The file parsed but declared no simple targets.
    Empty,
    /// The file could not be read.
    Error(String),
}

/// One menu group per configured Makefile.
#[derive(Debug, Clone)]
pub struct MenuGroup {
    pub id: ItemId,
    pub label: String,
    pub makefile: PathBuf,
    pub state: GroupState,
}

/// Handles to everything one build pass created.
#[derive(Debug, Default)]
pub struct MenuModel {
    groups: Vec<MenuGroup>,
    separator: Option<ItemId>,
    manage: Option<ItemId>,
    exit: Option<ItemId>,
    bindings: HashMap<ItemId, MenuAction>,
}

impl MenuModel {
    /// Builds one group per entry, in order, followed by the management group.
    ///
    /// A Makefile that cannot be read only affects its own group.
    pub fn build<B: MenuBackend>(entries: &[Entry], backend: &mut B) -> Self {
        let mut model = Self::default();
        for entry in entries {
            model.add_group(entry, backend);
        }
        model.add_management(backend);
        model
    }

    fn add_group<B: MenuBackend>(&mut self, entry: &Entry, backend: &mut B) {
        let label = entry.display_label();
        let makefile = entry.path.clone();
        let group = backend.add_item(&label, &makefile.display().to_string());

        let state = match targets::parse_targets(&makefile) {
            Err(err) => {
                warn!("{}: parse error: {:#}", makefile.display(), err);
                let item = backend.add_sub_item(group, "(error)", "parse error");
                backend.disable(item);
                GroupState::Error(format!("{:#}", err))
            }
            Ok(names) if names.is_empty() => {
                let item = backend.add_sub_item(group, "(no targets)", "empty Makefile");
                backend.disable(item);
                GroupState::Empty
            }
            Ok(names) => {
                for target in &names {
                    let tooltip = launcher::make_invocation(&makefile, target);
                    let item = backend.add_sub_item(group, target, &tooltip);
                    self.bindings.insert(
                        item,
                        MenuAction::Launch {
                            makefile: makefile.clone(),
                            target: target.clone(),
                        },
                    );
                }
                GroupState::Targets(names.len())
            }
        };

        self.groups.push(MenuGroup {
            id: group,
            label,
            makefile,
            state,
        });
    }

    fn add_management<B: MenuBackend>(&mut self, backend: &mut B) {
        self.separator = Some(backend.add_separator());
        let manage = backend.add_item("Settings", "");
        let add = backend.add_sub_item(manage, "Add…", "Add a new Makefile");
        let open = backend.add_sub_item(manage, "Open config…", "Open JSON config in an editor");
        let exit = backend.add_sub_item(manage, "Exit", "Close the app");
        self.bindings.insert(add, MenuAction::AddEntry);
        self.bindings.insert(open, MenuAction::OpenConfig);
        self.bindings.insert(exit, MenuAction::Exit);
        self.manage = Some(manage);
        self.exit = Some(exit);
    }

    /// Removes every item this model created and drops all bindings.
    pub fn teardown<B: MenuBackend>(&mut self, backend: &mut B) {
        let owned = self
            .groups
            .drain(..)
            .map(|group| group.id)
            .chain(self.separator.take())
            .chain(self.exit.take())
            .chain(self.manage.take());
        for id in owned {
            backend.remove(id);
        }
        self.bindings.clear();
    }

    /// Action bound to `id`, if the item belongs to this model and is clickable.
    pub fn action_for(&self, id: ItemId) -> Option<&MenuAction> {
        self.bindings.get(&id)
    }

    pub fn groups(&self) -> &[MenuGroup] {
        &self.groups
    }

    /// Number of clickable items.
    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }
}
