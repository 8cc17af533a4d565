// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared test fixtures.

use crate::ids::{AssetId, EntityId};
use crate::state::EditorState;
use crate::template::TemplateDefinition;
use crate::world::EntityAuthoring;
use tracing_subscriber::EnvFilter;

/// Install a test-writer subscriber once per test binary
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Build a scene from `(name, parent index)` pairs, parents listed first
pub fn scene(nodes: &[(&str, Option<usize>)]) -> (EditorState, Vec<EntityId>) {
    init_tracing();
    let mut state = EditorState::default();
    let mut ids: Vec<EntityId> = Vec::with_capacity(nodes.len());
    for (name, parent) in nodes {
        let parent = parent.map(|index| ids[index]);
        let id = state.create_entity(name, parent, None).unwrap();
        ids.push(id);
    }
    state.take_notifications();
    (state, ids)
}

/// Names of a node's children in display order
pub fn child_names(state: &EditorState, parent: Option<EntityId>) -> Vec<String> {
    state
        .tree
        .children_of(parent)
        .iter()
        .filter_map(|id| state.world.name(*id))
        .collect()
}

/// Assert the projection and the runtime graph agree on every child list
pub fn assert_layers_agree(state: &EditorState) {
    assert_eq!(state.tree.children_of(None), state.world.children_of(None).as_slice());
    for id in state.tree.preorder() {
        assert_eq!(
            state.tree.children_of(Some(id)),
            state.world.children_of(Some(id)).as_slice(),
            "children of {id} differ between layers"
        );
    }
    assert_eq!(state.tree.len(), state.world.len());
}

/// Register a resident template with a root and the given children
pub fn resident_template(state: &mut EditorState, name: &str, children: &[&str]) -> AssetId {
    let mut template = TemplateDefinition::new(name);
    for child in children {
        template.add_child(0, *child);
    }
    let asset = state.templates.register_template(template);
    state.assets.register_resident(asset);
    asset
}

/// Instantiate a resident template at the top level, returning its root
pub fn place_template(state: &mut EditorState, asset: AssetId) -> EntityId {
    let roots = state.templates.instantiate(&mut state.world, asset).unwrap();
    state
        .tree
        .insert_subtree(&state.world, roots[0], None, usize::MAX)
        .unwrap();
    state.world.attach(roots[0], None, usize::MAX).unwrap();
    roots[0]
}
