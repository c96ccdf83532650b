//! SQL lineage extraction.
//!
//! Parses a single SQL statement and produces candidate lineage edges: one
//! asset-level edge per (source table, target table) pair, and one
//! column-level edge per resolved source column reference. Extraction never
//! persists anything; the caller decides what to commit.
//!
//! # Supported statements
//!
//! - `INSERT INTO ... SELECT ...` (with or without an explicit column list)
//! - `CREATE TABLE ... AS SELECT ...`
//! - `CREATE VIEW ... AS SELECT ...`
//! - `SELECT ... INTO ...`
//! - `MERGE INTO ... USING ...` (asset-level edges only)
//!
//! Ambiguity is scored, never dropped: an unqualified column with more than
//! one candidate source table yields one edge per candidate at reduced
//! confidence, and wildcard projections yield a `*` edge per source table.

use std::collections::HashMap;

use sqlparser::ast::{
    Expr, FunctionArg, FunctionArgExpr, FunctionArguments, GroupByExpr, Query, Select, SelectItem,
    SetExpr, Statement, TableFactor, TableWithJoins,
};
use sqlparser::parser::Parser;
use tracing::debug;

use tracefuse_lineage_core::{Metadata, NewColumnLineageEdge, NewLineageEdge, TransformationType};

use crate::dialect::SqlDialect;
use crate::error::{ExtractError, Result};
use crate::types::SqlExtraction;

/// Asset-edge label for statements with no more specific shape.
pub const LABEL_SQL_TRANSFORM: &str = "SQL_TRANSFORM";

/// Asset-edge label for MERGE statements.
pub const LABEL_MERGE: &str = "MERGE";

/// Confidence assigned to wildcard (`*`) projections, which cannot be
/// resolved to concrete columns without a schema.
pub const WILDCARD_CONFIDENCE: f64 = 0.5;

/// Longest SQL prefix echoed back in parse errors.
const FRAGMENT_LEN: usize = 120;

/// Extracts candidate lineage edges from SQL text.
#[derive(Debug, Default, Clone, Copy)]
pub struct LineageExtractor {
    dialect: SqlDialect,
}

/// A single column reference found in a projected expression.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ColumnRef {
    /// Table name or alias prefix, when the reference was qualified
    qualifier: Option<String>,
    column: String,
}

/// Constructs observed while walking one expression tree.
#[derive(Debug, Default, Clone, Copy)]
struct ExprShape {
    has_aggregate: bool,
    has_case: bool,
    has_coalesce: bool,
    has_subquery: bool,
}

/// Resolution scope built from one SELECT's FROM clause. Each entry maps a
/// qualifier (alias or table name) to the base tables it stands for: a
/// plain table maps to itself, while a CTE or derived subquery maps to the
/// base tables discovered one level inside it.
#[derive(Debug, Default)]
struct TableScope {
    entries: Vec<ScopeEntry>,
}

#[derive(Debug)]
struct ScopeEntry {
    qualifier: String,
    tables: Vec<String>,
}

impl TableScope {
    /// All candidate base tables, in FROM order, deduplicated.
    fn candidates(&self) -> Vec<String> {
        let mut out = Vec::new();
        for entry in &self.entries {
            for table in &entry.tables {
                if !out.contains(table) {
                    out.push(table.clone());
                }
            }
        }
        out
    }

    /// Base tables a qualifier stands for. An unrecognized qualifier is
    /// taken verbatim as a table name; qualified references may spell a
    /// table differently from the FROM clause.
    fn resolve(&self, qualifier: &str) -> Vec<String> {
        self.entries
            .iter()
            .find(|entry| entry.qualifier == qualifier)
            .map(|entry| entry.tables.clone())
            .unwrap_or_else(|| vec![qualifier.to_string()])
    }
}

impl LineageExtractor {
    /// Create an extractor for the given dialect.
    pub fn new(dialect: SqlDialect) -> Self {
        Self { dialect }
    }

    /// The dialect this extractor parses under.
    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    /// Parse a single SQL statement and extract candidate lineage edges.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` when the text cannot be parsed at all,
    /// `UnsupportedStatement` for statement kinds outside the supported set,
    /// `MultipleStatements` when the input holds more than one statement,
    /// and `EmptyStatement` for blank input. Constructs the extractor
    /// recognizes but cannot fully resolve degrade to warnings and reduced
    /// confidence instead of failing.
    pub fn extract(&self, sql: &str) -> Result<SqlExtraction> {
        let sql = sql.trim();
        if sql.is_empty() {
            return Err(ExtractError::EmptyStatement);
        }

        debug!(dialect = self.dialect.as_str(), "extracting SQL lineage");

        let dialect = self.dialect.parser_dialect();
        let statements =
            Parser::parse_sql(dialect.as_ref(), sql).map_err(|e| ExtractError::ParseError {
                message: e.to_string(),
                fragment: fragment_of(sql),
            })?;

        if statements.is_empty() {
            return Err(ExtractError::EmptyStatement);
        }
        if statements.len() > 1 {
            return Err(ExtractError::MultipleStatements(statements.len()));
        }

        match &statements[0] {
            Statement::Query(query) => {
                let target = select_into_target(query).ok_or_else(|| {
                    ExtractError::UnsupportedStatement(
                        "SELECT without a destination table".to_string(),
                    )
                })?;
                self.extract_from_query(query, sql, &target, None)
            }
            Statement::Insert(insert) => {
                let source = insert.source.as_ref().ok_or_else(|| {
                    ExtractError::UnsupportedStatement("INSERT without a source query".to_string())
                })?;
                let target = insert.table.to_string();
                let columns: Vec<String> =
                    insert.columns.iter().map(|c| c.value.clone()).collect();
                let columns = (!columns.is_empty()).then_some(columns);
                self.extract_from_query(source, sql, &target, columns.as_deref())
            }
            Statement::CreateTable(create) => {
                let query = create.query.as_ref().ok_or_else(|| {
                    ExtractError::UnsupportedStatement(
                        "CREATE TABLE without AS SELECT".to_string(),
                    )
                })?;
                let target = create.name.to_string();
                let columns: Vec<String> =
                    create.columns.iter().map(|c| c.name.value.clone()).collect();
                let columns = (!columns.is_empty()).then_some(columns);
                self.extract_from_query(query, sql, &target, columns.as_deref())
            }
            Statement::CreateView {
                name,
                columns,
                query,
                ..
            } => {
                let target = name.to_string();
                let columns: Vec<String> =
                    columns.iter().map(|c| c.name.value.clone()).collect();
                let columns = (!columns.is_empty()).then_some(columns);
                self.extract_from_query(query, sql, &target, columns.as_deref())
            }
            Statement::Merge { table, source, .. } => self.extract_from_merge(table, source, sql),
            other => Err(ExtractError::UnsupportedStatement(statement_kind(other))),
        }
    }

    /// Extract lineage from a source query writing into `target_table`.
    fn extract_from_query(
        &self,
        query: &Query,
        sql: &str,
        target_table: &str,
        target_columns: Option<&[String]>,
    ) -> Result<SqlExtraction> {
        let mut extraction = SqlExtraction::new(target_table);
        let cte_map = self.collect_cte_tables(query);
        self.extract_from_setexpr(
            query.body.as_ref(),
            sql,
            target_table,
            target_columns,
            &cte_map,
            &mut extraction,
        )?;
        Ok(extraction)
    }

    fn extract_from_setexpr(
        &self,
        body: &SetExpr,
        sql: &str,
        target_table: &str,
        target_columns: Option<&[String]>,
        cte_map: &HashMap<String, Vec<String>>,
        extraction: &mut SqlExtraction,
    ) -> Result<()> {
        match body {
            SetExpr::Select(select) => self.extract_from_select(
                select,
                sql,
                target_table,
                target_columns,
                cte_map,
                extraction,
            ),
            SetExpr::Query(inner) => {
                // A parenthesized subquery may carry its own WITH list;
                // outer CTEs stay visible underneath it.
                let mut nested = self.collect_cte_tables(inner);
                for (name, tables) in cte_map {
                    nested.entry(name.clone()).or_insert_with(|| tables.clone());
                }
                self.extract_from_setexpr(
                    inner.body.as_ref(),
                    sql,
                    target_table,
                    target_columns,
                    &nested,
                    extraction,
                )
            }
            SetExpr::SetOperation { left, right, .. } => {
                // UNION/INTERSECT/EXCEPT: both branches feed the target
                self.extract_from_setexpr(
                    left,
                    sql,
                    target_table,
                    target_columns,
                    cte_map,
                    extraction,
                )?;
                self.extract_from_setexpr(
                    right,
                    sql,
                    target_table,
                    target_columns,
                    cte_map,
                    extraction,
                )
            }
            other => {
                extraction.add_warning(format!("Unsupported query body: {}", other));
                Ok(())
            }
        }
    }

    /// Extract asset and column edges from a single SELECT.
    fn extract_from_select(
        &self,
        select: &Select,
        sql: &str,
        target_table: &str,
        target_columns: Option<&[String]>,
        cte_map: &HashMap<String, Vec<String>>,
        extraction: &mut SqlExtraction,
    ) -> Result<()> {
        let scope = self.build_table_scope(&select.from, cte_map);
        let candidates = scope.candidates();
        let has_where = select.selection.is_some();

        for table in &candidates {
            if !extraction.source_tables.contains(table) {
                extraction.source_tables.push(table.clone());
            }
        }

        // Statement-shape label, most specific construct first.
        let mut shape = ExprShape::default();
        for item in &select.projection {
            if let SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } = item {
                let mut scratch = Vec::new();
                self.walk_expr(expr, &mut scratch, &mut shape);
            }
        }
        let label = if has_group_by(select) {
            TransformationType::Aggregated.as_str()
        } else if has_join(select) {
            TransformationType::Joined.as_str()
        } else if shape.has_case {
            TransformationType::Case.as_str()
        } else if shape.has_coalesce {
            TransformationType::Coalesced.as_str()
        } else {
            LABEL_SQL_TRANSFORM
        };

        for table in &candidates {
            push_asset_edge(table, target_table, label, sql, extraction);
        }

        // Column projections. An explicit target column list (INSERT INTO t
        // (a, b) SELECT ...) maps positionally; otherwise names are inferred
        // from the projection itself.
        for (position, item) in select.projection.iter().enumerate() {
            let explicit = target_columns
                .and_then(|cols| cols.get(position))
                .cloned();
            match item {
                SelectItem::UnnamedExpr(expr) => {
                    let target_column = explicit.unwrap_or_else(|| infer_column_name(expr));
                    self.extract_column_edges(
                        expr,
                        target_table,
                        &target_column,
                        has_where,
                        &scope,
                        extraction,
                    );
                }
                SelectItem::ExprWithAlias { expr, alias } => {
                    let target_column = explicit.unwrap_or_else(|| alias.value.clone());
                    self.extract_column_edges(
                        expr,
                        target_table,
                        &target_column,
                        has_where,
                        &scope,
                        extraction,
                    );
                }
                SelectItem::Wildcard(_) => {
                    push_wildcard_edges(&candidates, target_table, has_where, extraction);
                    extraction.add_warning(
                        "SELECT * cannot be resolved to columns without a schema; \
                         emitted one *->* edge per source table at reduced confidence",
                    );
                }
                SelectItem::QualifiedWildcard(name, _) => {
                    let qualified = scope.resolve(&name.to_string());
                    push_wildcard_edges(&qualified, target_table, has_where, extraction);
                    extraction.add_warning(format!(
                        "SELECT {}.* cannot be resolved to columns without a schema; \
                         emitted one *->* edge per source table at reduced confidence",
                        name
                    ));
                }
            }
        }

        if let Some(cols) = target_columns {
            let plain = select.projection.iter().all(|item| {
                !matches!(
                    item,
                    SelectItem::Wildcard(_) | SelectItem::QualifiedWildcard(..)
                )
            });
            if plain && cols.len() != select.projection.len() {
                extraction.add_warning(format!(
                    "target column list has {} names but the projection has {} items",
                    cols.len(),
                    select.projection.len()
                ));
            }
        }

        Ok(())
    }

    /// MERGE produces asset-level edges only; the per-clause column
    /// assignments are not resolved.
    fn extract_from_merge(
        &self,
        table: &TableFactor,
        source: &TableFactor,
        sql: &str,
    ) -> Result<SqlExtraction> {
        let target = table_factor_name(table).ok_or_else(|| {
            ExtractError::UnsupportedStatement("MERGE into a non-table target".to_string())
        })?;

        let mut extraction = SqlExtraction::new(&target);
        let cte_map = HashMap::new();
        let mut tables = Vec::new();
        self.collect_factor_tables(source, &cte_map, &mut tables);

        for source_table in &tables {
            if !extraction.source_tables.contains(source_table) {
                extraction.source_tables.push(source_table.clone());
            }
        }
        for source_table in &tables {
            push_asset_edge(source_table, &target, LABEL_MERGE, sql, &mut extraction);
        }
        extraction.add_warning("column-level lineage is not extracted from MERGE statements");
        Ok(extraction)
    }

    /// Emit column edges for one projected expression, resolving every
    /// column reference against the FROM scope.
    fn extract_column_edges(
        &self,
        expr: &Expr,
        target_table: &str,
        target_column: &str,
        has_where: bool,
        scope: &TableScope,
        extraction: &mut SqlExtraction,
    ) {
        let mut refs = Vec::new();
        let mut shape = ExprShape::default();
        self.walk_expr(expr, &mut refs, &mut shape);

        if shape.has_subquery {
            extraction.add_warning(format!(
                "subquery in expression for column '{}': lineage may be incomplete",
                target_column
            ));
        }

        let transformation = classify_projection(expr, shape, has_where);
        let bare = matches!(
            transformation,
            TransformationType::Direct | TransformationType::Filtered
        );
        let expression = (!bare).then(|| expr.to_string());

        for column_ref in refs {
            let sources = match &column_ref.qualifier {
                Some(qualifier) => scope.resolve(qualifier),
                None => scope.candidates(),
            };
            if sources.is_empty() {
                extraction.add_warning(format!(
                    "no source table in scope for column '{}'",
                    column_ref.column
                ));
                continue;
            }

            let count = sources.len();
            let confidence = 1.0 / count as f64;
            for source_table in sources {
                if source_table == target_table && column_ref.column == target_column {
                    extraction.add_warning(format!(
                        "self-referential column {}.{} skipped",
                        source_table, column_ref.column
                    ));
                    continue;
                }

                let mut edge = match &expression {
                    Some(text) => NewColumnLineageEdge::with_expression(
                        &source_table,
                        &column_ref.column,
                        target_table,
                        target_column,
                        transformation,
                        text,
                    ),
                    None => {
                        let mut direct = NewColumnLineageEdge::direct(
                            &source_table,
                            &column_ref.column,
                            target_table,
                            target_column,
                        );
                        direct.transformation = transformation;
                        direct
                    }
                };
                if count > 1 {
                    edge = edge
                        .with_confidence(confidence)
                        .with_metadata(ambiguity_metadata(&column_ref.column, count));
                }
                extraction.column_edges.push(edge);
            }
        }
    }

    /// Base tables named by every CTE, one level deep. Later CTEs may
    /// reference earlier ones; references resolve through the map built so
    /// far.
    fn collect_cte_tables(&self, query: &Query) -> HashMap<String, Vec<String>> {
        let mut cte_map = HashMap::new();
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                let mut tables = Vec::new();
                self.collect_query_tables(&cte.query, &cte_map, &mut tables);
                cte_map.insert(cte.alias.name.value.clone(), tables);
            }
        }
        cte_map
    }

    fn collect_query_tables(
        &self,
        query: &Query,
        cte_map: &HashMap<String, Vec<String>>,
        tables: &mut Vec<String>,
    ) {
        self.collect_setexpr_tables(query.body.as_ref(), cte_map, tables);
    }

    fn collect_setexpr_tables(
        &self,
        body: &SetExpr,
        cte_map: &HashMap<String, Vec<String>>,
        tables: &mut Vec<String>,
    ) {
        match body {
            SetExpr::Select(select) => {
                for table_with_joins in &select.from {
                    self.collect_factor_tables(&table_with_joins.relation, cte_map, tables);
                    for join in &table_with_joins.joins {
                        self.collect_factor_tables(&join.relation, cte_map, tables);
                    }
                }
            }
            SetExpr::Query(inner) => self.collect_query_tables(inner, cte_map, tables),
            SetExpr::SetOperation { left, right, .. } => {
                self.collect_setexpr_tables(left, cte_map, tables);
                self.collect_setexpr_tables(right, cte_map, tables);
            }
            _ => {}
        }
    }

    fn collect_factor_tables(
        &self,
        factor: &TableFactor,
        cte_map: &HashMap<String, Vec<String>>,
        tables: &mut Vec<String>,
    ) {
        match factor {
            TableFactor::Table { name, .. } => {
                let table_name = name.to_string();
                if let Some(underlying) = cte_map.get(&table_name) {
                    for table in underlying {
                        if !tables.contains(table) {
                            tables.push(table.clone());
                        }
                    }
                } else if !tables.contains(&table_name) {
                    tables.push(table_name);
                }
            }
            TableFactor::Derived { subquery, .. } => {
                self.collect_query_tables(subquery, cte_map, tables);
            }
            TableFactor::NestedJoin {
                table_with_joins, ..
            } => {
                self.collect_factor_tables(&table_with_joins.relation, cte_map, tables);
                for join in &table_with_joins.joins {
                    self.collect_factor_tables(&join.relation, cte_map, tables);
                }
            }
            _ => {}
        }
    }

    /// Build the qualifier resolution scope from a FROM clause.
    fn build_table_scope(
        &self,
        from: &[TableWithJoins],
        cte_map: &HashMap<String, Vec<String>>,
    ) -> TableScope {
        let mut scope = TableScope::default();
        for table_with_joins in from {
            self.add_factor_to_scope(&table_with_joins.relation, cte_map, &mut scope);
            for join in &table_with_joins.joins {
                self.add_factor_to_scope(&join.relation, cte_map, &mut scope);
            }
        }
        scope
    }

    fn add_factor_to_scope(
        &self,
        factor: &TableFactor,
        cte_map: &HashMap<String, Vec<String>>,
        scope: &mut TableScope,
    ) {
        match factor {
            TableFactor::Table { name, alias, .. } => {
                let table_name = name.to_string();
                let tables = cte_map
                    .get(&table_name)
                    .cloned()
                    .unwrap_or_else(|| vec![table_name.clone()]);
                let qualifier = alias
                    .as_ref()
                    .map(|a| a.name.value.clone())
                    .unwrap_or(table_name);
                scope.entries.push(ScopeEntry { qualifier, tables });
            }
            TableFactor::Derived {
                subquery, alias, ..
            } => {
                let mut tables = Vec::new();
                self.collect_query_tables(subquery, cte_map, &mut tables);
                let qualifier = alias
                    .as_ref()
                    .map(|a| a.name.value.clone())
                    .unwrap_or_default();
                scope.entries.push(ScopeEntry { qualifier, tables });
            }
            TableFactor::NestedJoin {
                table_with_joins, ..
            } => {
                self.add_factor_to_scope(&table_with_joins.relation, cte_map, scope);
                for join in &table_with_joins.joins {
                    self.add_factor_to_scope(&join.relation, cte_map, scope);
                }
            }
            _ => {}
        }
    }

    /// Recursively collect column references and record which constructs
    /// the expression contains.
    fn walk_expr(&self, expr: &Expr, refs: &mut Vec<ColumnRef>, shape: &mut ExprShape) {
        match expr {
            Expr::Identifier(ident) => {
                push_ref(refs, None, &ident.value);
            }
            Expr::CompoundIdentifier(parts) => {
                if parts.len() >= 2 {
                    let qualifier = parts[parts.len() - 2].value.clone();
                    let column = &parts[parts.len() - 1].value;
                    push_ref(refs, Some(qualifier), column);
                } else if let Some(part) = parts.last() {
                    push_ref(refs, None, &part.value);
                }
            }
            Expr::BinaryOp { left, right, .. } => {
                self.walk_expr(left, refs, shape);
                self.walk_expr(right, refs, shape);
            }
            Expr::Function(func) => {
                let func_name = func.name.to_string().to_uppercase();
                if is_aggregate_function(&func_name) {
                    shape.has_aggregate = true;
                }
                if self.dialect.is_coalesce_function(&func_name) {
                    shape.has_coalesce = true;
                }
                if let FunctionArguments::List(arg_list) = &func.args {
                    for arg in &arg_list.args {
                        match arg {
                            FunctionArg::Unnamed(FunctionArgExpr::Expr(e))
                            | FunctionArg::Named {
                                arg: FunctionArgExpr::Expr(e),
                                ..
                            } => self.walk_expr(e, refs, shape),
                            _ => {}
                        }
                    }
                }
                // Window functions draw lineage from the OVER clause too
                if let Some(sqlparser::ast::WindowType::WindowSpec(spec)) = &func.over {
                    for partition_expr in &spec.partition_by {
                        self.walk_expr(partition_expr, refs, shape);
                    }
                    for order_expr in &spec.order_by {
                        self.walk_expr(&order_expr.expr, refs, shape);
                    }
                }
            }
            Expr::Case {
                operand,
                conditions,
                results,
                else_result,
            } => {
                shape.has_case = true;
                if let Some(op) = operand {
                    self.walk_expr(op, refs, shape);
                }
                for cond in conditions {
                    self.walk_expr(cond, refs, shape);
                }
                for res in results {
                    self.walk_expr(res, refs, shape);
                }
                if let Some(else_expr) = else_result {
                    self.walk_expr(else_expr, refs, shape);
                }
            }
            Expr::Cast { expr: inner, .. }
            | Expr::UnaryOp { expr: inner, .. }
            | Expr::Nested(inner)
            | Expr::Trim { expr: inner, .. }
            | Expr::Extract { expr: inner, .. }
            | Expr::Collate { expr: inner, .. }
            | Expr::Floor { expr: inner, .. }
            | Expr::Ceil { expr: inner, .. }
            | Expr::IsNull(inner)
            | Expr::IsNotNull(inner) => {
                self.walk_expr(inner, refs, shape);
            }
            Expr::Substring {
                expr: inner,
                substring_from,
                substring_for,
                ..
            } => {
                self.walk_expr(inner, refs, shape);
                if let Some(from_expr) = substring_from {
                    self.walk_expr(from_expr, refs, shape);
                }
                if let Some(for_expr) = substring_for {
                    self.walk_expr(for_expr, refs, shape);
                }
            }
            Expr::Position {
                expr: inner,
                r#in: in_expr,
            } => {
                self.walk_expr(inner, refs, shape);
                self.walk_expr(in_expr, refs, shape);
            }
            Expr::Overlay {
                expr: inner,
                overlay_what,
                overlay_from,
                overlay_for,
            } => {
                self.walk_expr(inner, refs, shape);
                self.walk_expr(overlay_what, refs, shape);
                self.walk_expr(overlay_from, refs, shape);
                if let Some(for_expr) = overlay_for {
                    self.walk_expr(for_expr, refs, shape);
                }
            }
            Expr::Like {
                expr: inner,
                pattern,
                ..
            }
            | Expr::ILike {
                expr: inner,
                pattern,
                ..
            }
            | Expr::SimilarTo {
                expr: inner,
                pattern,
                ..
            } => {
                self.walk_expr(inner, refs, shape);
                self.walk_expr(pattern, refs, shape);
            }
            Expr::Between {
                expr: inner,
                low,
                high,
                ..
            } => {
                self.walk_expr(inner, refs, shape);
                self.walk_expr(low, refs, shape);
                self.walk_expr(high, refs, shape);
            }
            Expr::InList {
                expr: inner, list, ..
            } => {
                self.walk_expr(inner, refs, shape);
                for item in list {
                    self.walk_expr(item, refs, shape);
                }
            }
            Expr::IsDistinctFrom(left, right) | Expr::IsNotDistinctFrom(left, right) => {
                self.walk_expr(left, refs, shape);
                self.walk_expr(right, refs, shape);
            }
            Expr::Tuple(items) => {
                for item in items {
                    self.walk_expr(item, refs, shape);
                }
            }
            Expr::InSubquery { expr: inner, .. } => {
                shape.has_subquery = true;
                self.walk_expr(inner, refs, shape);
            }
            Expr::Subquery(_) | Expr::Exists { .. } => {
                shape.has_subquery = true;
            }
            // Literals and anything else carry no column references
            _ => {}
        }
    }
}

/// Classify one projected expression per the match-and-score policy:
/// aggregate beats CASE beats COALESCE; any other compound expression is
/// DERIVED; a bare column reference is FILTERED under a WHERE clause and
/// DIRECT otherwise.
fn classify_projection(expr: &Expr, shape: ExprShape, has_where: bool) -> TransformationType {
    if shape.has_aggregate {
        return TransformationType::Aggregated;
    }
    if shape.has_case {
        return TransformationType::Case;
    }
    if shape.has_coalesce {
        return TransformationType::Coalesced;
    }
    match unnest(expr) {
        Expr::Identifier(_) | Expr::CompoundIdentifier(_) => {
            if has_where {
                TransformationType::Filtered
            } else {
                TransformationType::Direct
            }
        }
        _ => TransformationType::Derived,
    }
}

fn unnest(expr: &Expr) -> &Expr {
    match expr {
        Expr::Nested(inner) => unnest(inner),
        _ => expr,
    }
}

fn push_ref(refs: &mut Vec<ColumnRef>, qualifier: Option<String>, column: &str) {
    let column_ref = ColumnRef {
        qualifier,
        column: column.to_string(),
    };
    if !refs.contains(&column_ref) {
        refs.push(column_ref);
    }
}

fn push_asset_edge(
    source: &str,
    target: &str,
    label: &str,
    sql: &str,
    extraction: &mut SqlExtraction,
) {
    if source == target {
        extraction.add_warning(format!(
            "self-referential table '{}' skipped at the asset level",
            source
        ));
        return;
    }
    let exists = extraction
        .asset_edges
        .iter()
        .any(|edge| edge.source_asset_id == source && edge.target_asset_id == target);
    if exists {
        return;
    }
    extraction.asset_edges.push(
        NewLineageEdge::new(source, target)
            .with_transformation_type(label)
            .with_transformation_logic(sql),
    );
}

fn push_wildcard_edges(
    tables: &[String],
    target_table: &str,
    has_where: bool,
    extraction: &mut SqlExtraction,
) {
    for source_table in tables {
        if source_table == target_table {
            extraction.add_warning(format!(
                "self-referential table '{}' skipped for wildcard projection",
                source_table
            ));
            continue;
        }
        let mut edge = NewColumnLineageEdge::direct(source_table, "*", target_table, "*")
            .with_confidence(WILDCARD_CONFIDENCE)
            .with_metadata(ambiguity_metadata("*", tables.len()));
        if has_where {
            edge.transformation = TransformationType::Filtered;
        }
        extraction.column_edges.push(edge);
    }
}

fn ambiguity_metadata(column: &str, candidates: usize) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert(
        "ambiguity".to_string(),
        serde_json::json!({ "column": column, "candidates": candidates }),
    );
    metadata
}

/// `SELECT ... INTO target` carries its destination inside the query body.
fn select_into_target(query: &Query) -> Option<String> {
    match query.body.as_ref() {
        SetExpr::Select(select) => select.into.as_ref().map(|into| into.name.to_string()),
        _ => None,
    }
}

fn table_factor_name(factor: &TableFactor) -> Option<String> {
    match factor {
        TableFactor::Table { name, .. } => Some(name.to_string()),
        _ => None,
    }
}

fn has_group_by(select: &Select) -> bool {
    match &select.group_by {
        GroupByExpr::All(_) => true,
        GroupByExpr::Expressions(exprs, _) => !exprs.is_empty(),
    }
}

fn has_join(select: &Select) -> bool {
    select.from.iter().any(|table| !table.joins.is_empty())
}

/// Infer a column name from an expression (for unnamed SELECT items).
fn infer_column_name(expr: &Expr) -> String {
    match expr {
        Expr::Identifier(ident) => ident.value.clone(),
        Expr::CompoundIdentifier(parts) => parts
            .last()
            .map(|i| i.value.clone())
            .unwrap_or_else(|| "?column?".to_string()),
        Expr::Function(func) => func.name.to_string(),
        Expr::Nested(inner) => infer_column_name(inner),
        _ => "?column?".to_string(),
    }
}

fn statement_kind(stmt: &Statement) -> String {
    match stmt {
        Statement::Update { .. } => "UPDATE".to_string(),
        Statement::Delete(_) => "DELETE".to_string(),
        Statement::Drop { .. } => "DROP".to_string(),
        Statement::Truncate { .. } => "TRUNCATE".to_string(),
        Statement::AlterTable { .. } => "ALTER TABLE".to_string(),
        Statement::Copy { .. } => "COPY".to_string(),
        other => fragment_of(&format!("{:?}", other)),
    }
}

fn fragment_of(sql: &str) -> String {
    if sql.chars().count() <= FRAGMENT_LEN {
        sql.to_string()
    } else {
        let head: String = sql.chars().take(FRAGMENT_LEN).collect();
        format!("{}...", head)
    }
}

/// Check if a function name is an aggregate function.
fn is_aggregate_function(name: &str) -> bool {
    matches!(
        name,
        "SUM"
            | "COUNT"
            | "AVG"
            | "MIN"
            | "MAX"
            | "STDDEV"
            | "STDDEV_POP"
            | "STDDEV_SAMP"
            | "VARIANCE"
            | "VAR_POP"
            | "VAR_SAMP"
            | "ARRAY_AGG"
            | "STRING_AGG"
            | "GROUP_CONCAT"
            | "LISTAGG"
            | "BOOL_AND"
            | "BOOL_OR"
            | "EVERY"
            | "BIT_AND"
            | "BIT_OR"
            | "BIT_XOR"
            | "APPROX_COUNT_DISTINCT"
            | "APPROX_PERCENTILE"
            | "PERCENTILE_CONT"
            | "PERCENTILE_DISC"
            | "FIRST_VALUE"
            | "LAST_VALUE"
            | "NTH_VALUE"
    )
}
