//! Static resource registry: one [`ResourceDef`] per admin-managed table.
//! Identifiers used to build SQL come only from here.

use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};

/// Column storage type; also the cast applied to bound parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    SmallInt,
    Int,
    BigInt,
    Text,
}

impl ColumnKind {
    pub fn pg_type(self) -> &'static str {
        match self {
            ColumnKind::SmallInt => "int2",
            ColumnKind::Int => "int4",
            ColumnKind::BigInt => "int8",
            ColumnKind::Text => "text",
        }
    }

    pub fn is_integer(self) -> bool {
        !matches!(self, ColumnKind::Text)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub required: bool,
    /// Column has a DB default; omitted from INSERT when the body leaves it out.
    pub has_default: bool,
}

const fn col(name: &'static str, kind: ColumnKind) -> ColumnDef {
    ColumnDef { name, kind, required: false, has_default: false }
}

const fn required(name: &'static str, kind: ColumnKind) -> ColumnDef {
    ColumnDef { name, kind, required: true, has_default: false }
}

const STATUS: ColumnDef = ColumnDef {
    name: "status",
    kind: ColumnKind::SmallInt,
    required: false,
    has_default: true,
};

/// Foreign reference checked before writes: `column` must name an existing `table.id`.
#[derive(Clone, Copy, Debug)]
pub struct Reference {
    pub column: &'static str,
    pub table: &'static str,
}

const IMAGE_REF: Reference = Reference { column: "image_id", table: "gallery" };
const USER_REF: Reference = Reference { column: "user_id", table: "users" };

/// `LEFT JOIN table ON table.id = main.local_column`, selecting `table.select AS alias`.
#[derive(Clone, Copy, Debug)]
pub struct LookupJoin {
    pub table: &'static str,
    pub local_column: &'static str,
    pub select: &'static str,
    pub alias: &'static str,
}

#[derive(Clone, Copy, Debug)]
pub struct OrderBy {
    pub column: &'static str,
    pub descending: bool,
}

const NEWEST_ID: OrderBy = OrderBy { column: "id", descending: true };

/// Anonymous read surface: only active rows, only whitelisted filters.
#[derive(Clone, Copy, Debug)]
pub struct PublicView {
    pub filters: &'static [&'static str],
    pub order: OrderBy,
    pub default_limit: Option<u32>,
}

#[derive(Clone, Copy, Debug)]
pub struct ResourceDef {
    pub name: &'static str,
    pub path_segment: &'static str,
    pub table: &'static str,
    /// Permission noun: "Read {noun}", "Create {noun}", ...
    pub permission_noun: &'static str,
    /// Writable columns (id and timestamps are managed by the service).
    pub columns: &'static [ColumnDef],
    /// Soft delete via `status = 0` when true; hard delete otherwise.
    pub has_status: bool,
    pub references: &'static [Reference],
    /// Columns holding media paths, rewritten to absolute URLs on output.
    pub media_columns: &'static [&'static str],
    pub joins: &'static [LookupJoin],
    /// Columns settable on their own via `PUT /{segment}/{id}/{column}`.
    pub flags: &'static [&'static str],
    pub admin_order: OrderBy,
    pub public: Option<PublicView>,
}

impl ResourceDef {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn permission(&self, action: Action) -> String {
        format!("{} {}", action.as_str(), self.permission_noun)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Read => "Read",
            Action::Create => "Create",
            Action::Update => "Update",
            Action::Delete => "Delete",
        }
    }
}

use ColumnKind::{BigInt, Int, SmallInt, Text};

pub const GALLERY: ResourceDef = ResourceDef {
    name: "gallery",
    path_segment: "gallery",
    table: "gallery",
    permission_noun: "gallery",
    columns: &[required("path", Text), col("image_id", BigInt), col("user_id", BigInt), STATUS],
    has_status: true,
    references: &[USER_REF],
    media_columns: &["path"],
    joins: &[],
    flags: &[],
    admin_order: NEWEST_ID,
    public: Some(PublicView { filters: &[], order: NEWEST_ID, default_limit: None }),
};

pub const BANNER: ResourceDef = ResourceDef {
    name: "banner",
    path_segment: "banners",
    table: "banner",
    permission_noun: "banners",
    columns: &[
        col("image_id", BigInt),
        col("title", Text),
        col("path", Text),
        required("user_id", BigInt),
        STATUS,
        col("type", SmallInt),
    ],
    has_status: true,
    references: &[IMAGE_REF, USER_REF],
    media_columns: &["path", "gallery_path"],
    joins: &[LookupJoin { table: "gallery", local_column: "image_id", select: "path", alias: "gallery_path" }],
    flags: &["type"],
    admin_order: NEWEST_ID,
    public: Some(PublicView {
        filters: &["type"],
        order: OrderBy { column: "updated_at", descending: true },
        default_limit: None,
    }),
};

pub const MISSION: ResourceDef = ResourceDef {
    name: "mission",
    path_segment: "missions",
    table: "mission",
    permission_noun: "missions",
    columns: &[
        col("mission", Text),
        col("value", Text),
        col("history", Text),
        col("image_id", BigInt),
        col("path", Text),
        col("user_id", BigInt),
        STATUS,
    ],
    has_status: true,
    references: &[IMAGE_REF, USER_REF],
    media_columns: &["path"],
    joins: &[],
    flags: &[],
    admin_order: NEWEST_ID,
    public: Some(PublicView { filters: &[], order: OrderBy { column: "id", descending: false }, default_limit: None }),
};

pub const WELCOME: ResourceDef = ResourceDef {
    name: "welcome",
    path_segment: "welcome",
    table: "welcome",
    permission_noun: "welcome",
    columns: &[
        col("title", Text),
        col("detail", Text),
        col("image_id", BigInt),
        col("path", Text),
        col("banner_id", BigInt),
        required("user_id", BigInt),
        STATUS,
    ],
    has_status: true,
    references: &[IMAGE_REF, Reference { column: "banner_id", table: "banner" }, USER_REF],
    media_columns: &["path"],
    joins: &[],
    flags: &[],
    admin_order: NEWEST_ID,
    public: Some(PublicView { filters: &[], order: NEWEST_ID, default_limit: None }),
};

pub const INDUSTRY: ResourceDef = ResourceDef {
    name: "industry",
    path_segment: "industries",
    table: "industry_development",
    permission_noun: "Industries",
    columns: &[
        col("year", Int),
        required("title", Text),
        required("image_id", BigInt),
        col("path", Text),
        required("user_id", BigInt),
        STATUS,
    ],
    has_status: true,
    references: &[IMAGE_REF, USER_REF],
    media_columns: &["path"],
    joins: &[],
    flags: &[],
    admin_order: OrderBy { column: "year", descending: false },
    public: Some(PublicView { filters: &[], order: OrderBy { column: "year", descending: false }, default_limit: None }),
};

pub const CEO: ResourceDef = ResourceDef {
    name: "ceo",
    path_segment: "ceos",
    table: "profile_ceo",
    permission_noun: "ceos",
    columns: &[
        required("image_id", BigInt),
        col("path", Text),
        required("name", Text),
        col("detail", Text),
        required("user_id", BigInt),
        STATUS,
        col("testimonial", Text),
        col("testimonial_title", Text),
        col("testimonial_descriptions", Text),
        col("publisher", SmallInt),
    ],
    has_status: true,
    references: &[IMAGE_REF, USER_REF],
    media_columns: &["path"],
    joins: &[],
    flags: &["publisher"],
    admin_order: NEWEST_ID,
    public: Some(PublicView { filters: &["publisher"], order: NEWEST_ID, default_limit: None }),
};

pub const SOLUTION: ResourceDef = ResourceDef {
    name: "solution",
    path_segment: "solutions",
    table: "solution",
    permission_noun: "solutions",
    columns: &[
        col("category", Text),
        col("category_sub", Text),
        required("title", Text),
        required("image_id", BigInt),
        col("path", Text),
        required("user_id", BigInt),
        STATUS,
    ],
    has_status: true,
    references: &[IMAGE_REF, USER_REF],
    media_columns: &["path"],
    joins: &[],
    flags: &[],
    admin_order: NEWEST_ID,
    public: Some(PublicView { filters: &["category"], order: NEWEST_ID, default_limit: Some(4) }),
};

pub const SPECIFICATION: ResourceDef = ResourceDef {
    name: "specification",
    path_segment: "specifications",
    table: "specification",
    permission_noun: "specifications",
    columns: &[required("title", Text), col("descriptions", Text), col("user_id", BigInt), STATUS],
    has_status: true,
    references: &[USER_REF],
    media_columns: &[],
    joins: &[],
    flags: &[],
    admin_order: NEWEST_ID,
    public: Some(PublicView { filters: &[], order: NEWEST_ID, default_limit: None }),
};

pub const PERMISSION: ResourceDef = ResourceDef {
    name: "permission",
    path_segment: "permissions",
    table: "permission",
    permission_noun: "permissions",
    columns: &[required("name", Text), STATUS],
    has_status: true,
    references: &[],
    media_columns: &[],
    joins: &[],
    flags: &[],
    admin_order: OrderBy { column: "id", descending: false },
    public: None,
};

pub const CONTACT: ResourceDef = ResourceDef {
    name: "contact",
    path_segment: "contacts",
    table: "contact_us",
    permission_noun: "contacts",
    columns: &[
        required("name", Text),
        required("email", Text),
        col("subject", Text),
        required("message", Text),
    ],
    has_status: false,
    references: &[],
    media_columns: &[],
    joins: &[],
    flags: &[],
    admin_order: NEWEST_ID,
    public: None,
};

pub const ALL: &[ResourceDef] = &[
    GALLERY,
    BANNER,
    MISSION,
    WELCOME,
    INDUSTRY,
    CEO,
    SOLUTION,
    SPECIFICATION,
    PERMISSION,
    CONTACT,
];

/// Registry keyed by path segment, built once at startup.
#[derive(Clone, Debug)]
pub struct ResourceRegistry {
    by_path: HashMap<&'static str, &'static ResourceDef>,
}

impl ResourceRegistry {
    /// Build from definitions, rejecting duplicate segments and flags/filters/references
    /// that name unknown columns.
    pub fn build(defs: &'static [ResourceDef]) -> Result<Self, ConfigError> {
        let mut by_path = HashMap::new();
        for def in defs {
            validate_def(def)?;
            if by_path.insert(def.path_segment, def).is_some() {
                return Err(ConfigError::DuplicatePathSegment(def.path_segment.to_string()));
            }
        }
        Ok(ResourceRegistry { by_path })
    }

    pub fn standard() -> Result<Self, ConfigError> {
        Self::build(ALL)
    }

    pub fn get(&self, path_segment: &str) -> Option<&'static ResourceDef> {
        self.by_path.get(path_segment).copied()
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }
}

fn validate_def(def: &ResourceDef) -> Result<(), ConfigError> {
    let names: HashSet<&str> = def.columns.iter().map(|c| c.name).collect();
    let unknown = |column: &str| ConfigError::UnknownColumn {
        resource: def.name,
        column: column.to_string(),
    };
    for flag in def.flags {
        if !names.contains(flag) {
            return Err(unknown(flag));
        }
    }
    for r in def.references {
        if !names.contains(r.column) {
            return Err(unknown(r.column));
        }
    }
    for j in def.joins {
        if !names.contains(j.local_column) {
            return Err(unknown(j.local_column));
        }
    }
    if let Some(public) = &def.public {
        for f in public.filters {
            if !names.contains(f) {
                return Err(unknown(f));
            }
        }
        if public.filters.contains(&"status") {
            return Err(unknown("status"));
        }
    }
    if def.has_status && !names.contains("status") {
        return Err(unknown("status"));
    }
    Ok(())
}
