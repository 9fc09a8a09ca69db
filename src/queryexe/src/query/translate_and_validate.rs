use common::catalog::Catalog;
use common::ra::{AttrRef, ComparisonOp, Operand, Predicate, RaExpr};
use common::schema::resolve_schema;
use common::{Field, RamrError};
use sqlparser::ast::{
    BinaryOperator, Expr, JoinConstraint, JoinOperator, ObjectName, Query, Select, SelectItem,
    SetExpr, Statement, TableFactor, TableWithJoins, Value,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

/// Translates SQL into an RA expression.
/// Validates the relations and columns referenced using the catalog.
/// Shares lifetime 'a with catalog
pub struct TranslateAndValidate<'a, T: Catalog + ?Sized> {
    /// Catalog to validate the translations.
    catalog: &'a T,
}

/// Extracts the relation name of a table reference.
fn get_name(name: &ObjectName) -> Result<String, RamrError> {
    match name.0.as_slice() {
        [single] => Ok(single.clone()),
        _ => Err(RamrError::ValidationError(format!(
            "No . table names supported in {}",
            name
        ))),
    }
}

fn unsupported(what: &str) -> RamrError {
    RamrError::ValidationError(format!("{} not supported", what))
}

impl<'a, T: 'a + Catalog + ?Sized> TranslateAndValidate<'a, T> {
    fn new(catalog: &'a T) -> Self {
        Self { catalog }
    }

    /// Parses `sql` and translates the single query it contains.
    ///
    /// # Arguments
    ///
    /// * `sql` - Text of one SELECT statement.
    /// * `catalog` - Catalog for validation.
    pub fn from_sql(sql: &str, catalog: &'a T) -> Result<RaExpr, RamrError> {
        let dialect = GenericDialect {};
        let mut statements = Parser::parse_sql(&dialect, sql.to_string())
            .map_err(|e| RamrError::ValidationError(format!("{:?}", e)))?;
        if statements.len() != 1 {
            return Err(RamrError::ValidationError(format!(
                "Expected one statement, found {}",
                statements.len()
            )));
        }
        match statements.pop() {
            Some(Statement::Query(query)) => Self::from_query(&query, catalog),
            _ => Err(unsupported("Statements other than SELECT")),
        }
    }

    /// Translates a parsed query.
    ///
    /// The FROM list becomes a left-deep cross product, the WHERE clause a
    /// selection on top of it and the SELECT list a projection. `SELECT *`
    /// adds no projection.
    pub fn from_query(query: &Query, catalog: &'a T) -> Result<RaExpr, RamrError> {
        if !query.order_by.is_empty() || query.limit.is_some() {
            return Err(unsupported("ORDER BY and LIMIT"));
        }
        let translator = Self::new(catalog);
        let expr = match &query.body {
            SetExpr::Select(select) => translator.process_select(select)?,
            _ => return Err(unsupported("Set operations and nested queries")),
        };
        translator.validate(&expr)?;
        debug!("Translated query into {}", expr);
        Ok(expr)
    }

    fn process_select(&self, select: &Select) -> Result<RaExpr, RamrError> {
        if select.distinct {
            return Err(unsupported("DISTINCT"));
        }
        if !select.group_by.is_empty() || select.having.is_some() {
            return Err(unsupported("GROUP BY and HAVING"));
        }

        // From
        let mut node: Option<RaExpr> = None;
        for item in &select.from {
            let expr = self.process_table_with_joins(item)?;
            node = Some(match node {
                None => expr,
                Some(left) => RaExpr::cross(left, expr),
            });
        }
        let mut node = node.ok_or_else(|| unsupported("SELECT without FROM"))?;

        // Where
        if let Some(expr) = &select.selection {
            node = node.select(self.process_condition(expr)?);
        }

        // Select
        let mut attributes = Vec::new();
        for item in &select.projection {
            match item {
                SelectItem::Wildcard if select.projection.len() == 1 => return Ok(node),
                SelectItem::Wildcard => {
                    return Err(RamrError::ValidationError(String::from(
                        "Cannot select wildcard and exp in same select",
                    )))
                }
                SelectItem::UnnamedExpr(expr) => attributes.push(self.expr_to_attr(expr)?),
                _ => return Err(unsupported("Aliased or qualified wildcard select items")),
            }
        }
        Ok(node.project(attributes))
    }

    fn process_table_with_joins(&self, item: &TableWithJoins) -> Result<RaExpr, RamrError> {
        let mut node = self.process_table_factor(&item.relation)?;
        for join in &item.joins {
            let right = self.process_table_factor(&join.relation)?;
            node = match &join.join_operator {
                JoinOperator::Inner(JoinConstraint::On(expr)) => {
                    RaExpr::join(self.process_condition(expr)?, node, right)
                }
                JoinOperator::CrossJoin => RaExpr::cross(node, right),
                _ => return Err(unsupported("Join type")),
            };
        }
        Ok(node)
    }

    /// A base relation, renamed when the query gives it an alias.
    fn process_table_factor(&self, tf: &TableFactor) -> Result<RaExpr, RamrError> {
        match tf {
            TableFactor::Table { name, alias, .. } => {
                let name = get_name(name)?;
                if !self.catalog.is_valid_table(&name) {
                    return Err(RamrError::UnknownRelation(name));
                }
                let relation = RaExpr::relation(&name);
                Ok(match alias {
                    None => relation,
                    Some(alias) => {
                        let columns = if alias.columns.is_empty() {
                            None
                        } else {
                            Some(alias.columns.clone())
                        };
                        relation.rename(&alias.name, columns)
                    }
                })
            }
            _ => Err(unsupported("Nested joins and derived tables")),
        }
    }

    /// Parses a WHERE or ON clause into a conjunction of comparisons.
    fn process_condition(&self, expr: &Expr) -> Result<Predicate, RamrError> {
        let mut conjuncts = Vec::new();
        self.collect_conjuncts(expr, &mut conjuncts)?;
        Predicate::conjunction(conjuncts).ok_or_else(|| unsupported("Empty condition"))
    }

    fn collect_conjuncts(&self, expr: &Expr, out: &mut Vec<Predicate>) -> Result<(), RamrError> {
        match expr {
            Expr::Nested(inner) => self.collect_conjuncts(inner, out),
            Expr::BinaryOp {
                left,
                op: BinaryOperator::And,
                right,
            } => {
                self.collect_conjuncts(left, out)?;
                self.collect_conjuncts(right, out)
            }
            Expr::BinaryOp { left, op, right } => {
                let l = self.expr_to_operand(left)?;
                let r = self.expr_to_operand(right)?;
                let predicate = match op {
                    BinaryOperator::Eq => Predicate::Equality(l, r),
                    BinaryOperator::Or => return Err(unsupported("OR")),
                    other => Predicate::Comparison(l, Self::binary_operator_to_comparison(other)?, r),
                };
                out.push(predicate);
                Ok(())
            }
            _ => Err(RamrError::ValidationError(String::from(
                "Unsupported binary operation",
            ))),
        }
    }

    /// Parses binary operator to a comparison operator.
    fn binary_operator_to_comparison(op: &BinaryOperator) -> Result<ComparisonOp, RamrError> {
        match op {
            BinaryOperator::Gt => Ok(ComparisonOp::GreaterThan),
            BinaryOperator::Lt => Ok(ComparisonOp::LessThan),
            BinaryOperator::GtEq => Ok(ComparisonOp::GreaterThanOrEq),
            BinaryOperator::LtEq => Ok(ComparisonOp::LessThanOrEq),
            BinaryOperator::NotEq => Ok(ComparisonOp::NotEq),
            _ => Err(RamrError::ValidationError(String::from(
                "Unsupported binary operation",
            ))),
        }
    }

    fn expr_to_operand(&self, expr: &Expr) -> Result<Operand, RamrError> {
        match expr {
            Expr::Nested(inner) => self.expr_to_operand(inner),
            Expr::Value(Value::Number(s)) => match s.parse::<i64>() {
                Ok(i) => Ok(Operand::Literal(Field::IntField(i))),
                Err(_) => s
                    .parse::<f64>()
                    .map(|x| Operand::Literal(Field::FloatField(x)))
                    .map_err(|_| RamrError::ValidationError(format!("Unsupported literal {}", s))),
            },
            Expr::Value(Value::SingleQuotedString(s)) => {
                Ok(Operand::Literal(Field::StringField(s.to_string())))
            }
            Expr::Value(_) => Err(RamrError::ValidationError(String::from(
                "Unsupported literal in predicate",
            ))),
            _ => Ok(Operand::Attr(self.expr_to_attr(expr)?)),
        }
    }

    fn expr_to_attr(&self, expr: &Expr) -> Result<AttrRef, RamrError> {
        match expr {
            Expr::Identifier(name) => Ok(AttrRef::unqualified(name)),
            Expr::CompoundIdentifier(names) => match names.as_slice() {
                [relation, column] => Ok(AttrRef::new(relation, column)),
                _ => Err(RamrError::ValidationError(format!(
                    "No . table names supported in field {}",
                    names.join(".")
                ))),
            },
            _ => Err(RamrError::ValidationError(String::from(
                "Unsupported expression",
            ))),
        }
    }

    /// Checks every attribute reference against the schema it is
    /// evaluated in.
    fn validate(&self, expr: &RaExpr) -> Result<(), RamrError> {
        for input in expr.inputs() {
            self.validate(input)?;
        }
        let scope = match expr {
            RaExpr::Select { input, .. } => resolve_schema(input, self.catalog)?,
            RaExpr::Join { .. } => resolve_schema(expr, self.catalog)?,
            // Projections and renames are checked by resolving the schema.
            _ => {
                resolve_schema(expr, self.catalog)?;
                return Ok(());
            }
        };
        if let RaExpr::Select { predicate, .. } | RaExpr::Join { predicate, .. } = expr {
            for attr in predicate.attributes() {
                scope.index_of(attr)?;
            }
        }
        Ok(())
    }
}
