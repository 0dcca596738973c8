//! Directive registry.
//!
//! A fixed, ordered table mapping directive names and shortcuts to one of
//! three behaviour classes. New directives are added as new rows; the parser
//! only dispatches on the class.

use super::ast::NodeType;

/// A registered directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Directive {
    pub name: &'static str,
    pub shortcut: Option<&'static str>,
    pub class: DirectiveClass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveClass {
    /// Sets a field on the owning song; adds no node.
    Metadata(MetaField),
    /// Appends a leaf marker at the insertion point.
    Inline(InlineMarker),
    /// Opens a container that a matching closing directive ends.
    Scoped(ScopedBlock),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaField {
    Title,
    Artist,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlineMarker {
    ChorusReference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopedBlock {
    pub block: BlockKind,
    pub closing_name: &'static str,
    pub closing_shortcut: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Verse,
    Chorus,
}

impl BlockKind {
    pub fn node_type(self) -> NodeType {
        match self {
            Self::Verse => NodeType::Verse,
            Self::Chorus => NodeType::Chorus,
        }
    }

    pub fn from_node_type(node_type: NodeType) -> Option<Self> {
        match node_type {
            NodeType::Verse => Some(Self::Verse),
            NodeType::Chorus => Some(Self::Chorus),
            _ => None,
        }
    }
}

pub const DIRECTIVES: &[Directive] = &[
    Directive {
        name: "title",
        shortcut: Some("t"),
        class: DirectiveClass::Metadata(MetaField::Title),
    },
    Directive {
        name: "artist",
        shortcut: None,
        class: DirectiveClass::Metadata(MetaField::Artist),
    },
    Directive {
        name: "start_of_chorus",
        shortcut: Some("soc"),
        class: DirectiveClass::Scoped(ScopedBlock {
            block: BlockKind::Chorus,
            closing_name: "end_of_chorus",
            closing_shortcut: Some("eoc"),
        }),
    },
    Directive {
        name: "start_of_verse",
        shortcut: Some("sov"),
        class: DirectiveClass::Scoped(ScopedBlock {
            block: BlockKind::Verse,
            closing_name: "end_of_verse",
            closing_shortcut: Some("eov"),
        }),
    },
    Directive {
        name: "chorus",
        shortcut: None,
        class: DirectiveClass::Inline(InlineMarker::ChorusReference),
    },
];

impl Directive {
    pub fn matches(&self, name: &str) -> bool {
        self.name == name || self.shortcut == Some(name)
    }
}

impl ScopedBlock {
    pub fn is_closed_by(&self, name: &str) -> bool {
        self.closing_name == name || self.closing_shortcut == Some(name)
    }
}

/// First directive whose name or shortcut matches exactly.
pub fn lookup(name: &str) -> Option<&'static Directive> {
    DIRECTIVES.iter().find(|d| d.matches(name))
}

/// The scoped directive that opens a block of the given kind.
pub fn scoped(block: BlockKind) -> Option<(&'static Directive, ScopedBlock)> {
    DIRECTIVES.iter().find_map(|d| match d.class {
        DirectiveClass::Scoped(scope) if scope.block == block => Some((d, scope)),
        _ => None,
    })
}

/// The directive that sets a metadata field.
pub fn metadata(field: MetaField) -> Option<&'static Directive> {
    DIRECTIVES
        .iter()
        .find(|d| d.class == DirectiveClass::Metadata(field))
}

/// The directive that appends an inline marker.
pub fn inline(marker: InlineMarker) -> Option<&'static Directive> {
    DIRECTIVES
        .iter()
        .find(|d| d.class == DirectiveClass::Inline(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name_and_shortcut() {
        assert_eq!(lookup("title").map(|d| d.name), Some("title"));
        assert_eq!(lookup("t").map(|d| d.name), Some("title"));
        assert_eq!(lookup("soc").map(|d| d.name), Some("start_of_chorus"));
        assert_eq!(lookup("sov").map(|d| d.name), Some("start_of_verse"));
        assert_eq!(lookup("chorus").map(|d| d.name), Some("chorus"));
    }

    #[test]
    fn lookup_is_case_sensitive() {
        assert!(lookup("Title").is_none());
        assert!(lookup("SOC").is_none());
    }

    #[test]
    fn closing_names_are_not_directives() {
        assert!(lookup("end_of_chorus").is_none());
        assert!(lookup("eov").is_none());
    }

    #[test]
    fn scoped_blocks_know_their_closers() {
        let (open, scope) = scoped(BlockKind::Chorus).unwrap();
        assert_eq!(open.name, "start_of_chorus");
        assert!(scope.is_closed_by("end_of_chorus"));
        assert!(scope.is_closed_by("eoc"));
        assert!(!scope.is_closed_by("eov"));
    }

    #[test]
    fn table_order_is_fixed() {
        let names: Vec<_> = DIRECTIVES.iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            vec!["title", "artist", "start_of_chorus", "start_of_verse", "chorus"]
        );
    }

    #[test]
    fn block_kind_maps_node_types() {
        assert_eq!(BlockKind::from_node_type(NodeType::Verse), Some(BlockKind::Verse));
        assert_eq!(BlockKind::from_node_type(NodeType::Line), None);
        assert_eq!(BlockKind::Chorus.node_type(), NodeType::Chorus);
    }
}
