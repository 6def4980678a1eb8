//! Views
//!
//! Named collections or composable functions defined as queries over other
//! sources. The builder receives the reference arguments, so a function
//! `ByStatus(status)` can expand into `Customers.where(it.Status == status)`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::expr::Expr;
use crate::rewrite::{Expander, RewriteContext, RewriteError, RewriteResult};
use crate::schema::{SchemaError, SchemaModel};

type ViewBuilder = Arc<dyn Fn(&SchemaModel, &[Expr]) -> Result<Expr, SchemaError> + Send + Sync>;

/// Expander replacing references to views with their definition
#[derive(Clone, Default)]
pub struct ViewExpander {
    views: HashMap<String, ViewBuilder>,
}

impl ViewExpander {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define the view `name`
    pub fn view<F>(mut self, name: impl Into<String>, builder: F) -> Self
    where
        F: Fn(&SchemaModel, &[Expr]) -> Result<Expr, SchemaError> + Send + Sync + 'static,
    {
        self.views.insert(name.into(), Arc::new(builder));
        self
    }

    pub fn defines(&self, name: &str) -> bool {
        self.views.contains_key(name)
    }
}

impl fmt::Debug for ViewExpander {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.views.keys().collect();
        names.sort();
        f.debug_struct("ViewExpander").field("views", &names).finish()
    }
}

impl Expander for ViewExpander {
    fn name(&self) -> &str {
        "views"
    }

    fn expand(&self, ctx: &RewriteContext<'_>) -> RewriteResult<Option<Expr>> {
        let reference = match ctx.binding().as_data_reference() {
            Some(r) => r,
            None => return Ok(None),
        };
        let builder = match self.views.get(&reference.name) {
            Some(b) => b,
            None => return Ok(None),
        };
        builder(ctx.model(), &reference.args)
            .map(Some)
            .map_err(|e| RewriteError::hook(self.name(), format!("{}: {}", reference.name, e.message())))
    }
}
