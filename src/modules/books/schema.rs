//! Declarative definition of the `books` table.
//!
//! The same definition drives the DDL migration, the column lists used by the
//! repository, and the length/precision limits enforced by validation.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Store-assigned integer key, never reused.
    Serial,
    Text { max_len: usize },
    /// Fixed-point number kept as canonical text, since SQLite has no exact decimal type.
    Decimal { precision: u32, scale: u32 },
    /// Case-folded copy of another text column, written by the store and
    /// never exposed to callers. SQLite's `lower()` only folds ASCII.
    Folded { source: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub nullable: bool,
    pub unique: bool,
}

impl Column {
    const fn serial(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Serial,
            nullable: false,
            unique: true,
        }
    }

    const fn text(name: &'static str, max_len: usize) -> Self {
        Self {
            name,
            kind: ColumnKind::Text { max_len },
            nullable: false,
            unique: false,
        }
    }

    const fn decimal(name: &'static str, precision: u32, scale: u32) -> Self {
        Self {
            name,
            kind: ColumnKind::Decimal { precision, scale },
            nullable: true,
            unique: false,
        }
    }

    const fn folded(name: &'static str, source: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Folded { source },
            nullable: false,
            unique: false,
        }
    }

    const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn max_len(&self) -> Option<usize> {
        match self.kind {
            ColumnKind::Text { max_len } => Some(max_len),
            _ => None,
        }
    }

    fn ddl(&self) -> String {
        let name = self.name;
        match self.kind {
            ColumnKind::Serial => format!("{name} INTEGER PRIMARY KEY AUTOINCREMENT"),
            ColumnKind::Text { max_len } => format!(
                "{name} TEXT{}{} CHECK (length({name}) <= {max_len})",
                if self.nullable { "" } else { " NOT NULL" },
                if self.unique { " UNIQUE" } else { "" },
            ),
            ColumnKind::Decimal { .. } | ColumnKind::Folded { .. } => format!(
                "{name} TEXT{}",
                if self.nullable { "" } else { " NOT NULL" }
            ),
        }
    }
}

#[derive(Debug)]
pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Columns a caller may write, in declaration order.
    pub fn mutable_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|column| {
            !matches!(column.kind, ColumnKind::Serial | ColumnKind::Folded { .. })
        })
    }

    /// Every column written on insert and update: caller columns, then derived ones.
    pub fn stored_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns
            .iter()
            .filter(|column| column.kind != ColumnKind::Serial)
    }

    /// The folded column derived from `source`, if any.
    pub fn folded_column(&self, source: &str) -> Option<&'static str> {
        self.columns.iter().find_map(|column| match column.kind {
            ColumnKind::Folded { source: from } if from == source => Some(column.name),
            _ => None,
        })
    }

    pub fn key_column(&self) -> &'static str {
        self.columns
            .iter()
            .find(|column| column.kind == ColumnKind::Serial)
            .map(|column| column.name)
            .unwrap_or("id")
    }

    pub fn select_list(&self) -> String {
        self.columns
            .iter()
            .filter(|column| !matches!(column.kind, ColumnKind::Folded { .. }))
            .map(|column| column.name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn create_sql(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|column| format!("    {}", column.ddl()))
            .collect::<Vec<_>>()
            .join(",\n");
        format!("CREATE TABLE {} (\n{}\n);", self.name, columns)
    }

    pub fn insert_sql(&self) -> String {
        let names: Vec<&str> = self.stored_columns().map(|c| c.name).collect();
        let placeholders = vec!["?"; names.len()].join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.name,
            names.join(", "),
            placeholders
        )
    }

    pub fn update_sql(&self) -> String {
        let assignments = self
            .stored_columns()
            .map(|c| format!("{} = ?", c.name))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "UPDATE {} SET {} WHERE {} = ?",
            self.name,
            assignments,
            self.key_column()
        )
    }
}

pub const BOOKS: Table = Table {
    name: "books",
    columns: &[
        Column::serial("id"),
        Column::text("title", 200),
        Column::text("author", 100),
        Column::text("isbn", 13).unique(),
        Column::text("description", 3000),
        Column::decimal("price", 10, 2),
        Column::folded("title_key", "title"),
    ],
};
