//! Validated aggregate request: the fragment list, the optional axis and the
//! named slots derived from role + clause combinations.

use std::fmt;

use crate::axis::QueryAxis;
use crate::error::{AggsynthError, Result};
use crate::fragment::{CustomLine, CustomLineRole, QueryComponent};
use crate::syntax::QuerySyntaxHelper;

/// A logical position in an aggregate, found by role and clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    CountSelect,
    AxisSelect,
    AxisGroupBy,
    PivotSelect,
    TopXOrderBy,
    TopXSelect,
    TopXPostfix,
}

impl Slot {
    pub fn role(self) -> CustomLineRole {
        match self {
            Slot::CountSelect => CustomLineRole::CountFunction,
            Slot::AxisSelect | Slot::AxisGroupBy => CustomLineRole::Axis,
            Slot::PivotSelect => CustomLineRole::Pivot,
            Slot::TopXOrderBy | Slot::TopXSelect | Slot::TopXPostfix => CustomLineRole::TopX,
        }
    }

    pub fn location(self) -> QueryComponent {
        match self {
            Slot::CountSelect | Slot::AxisSelect | Slot::PivotSelect => {
                QueryComponent::QueryTimeColumn
            }
            Slot::AxisGroupBy => QueryComponent::GroupBy,
            Slot::TopXOrderBy => QueryComponent::OrderBy,
            Slot::TopXSelect => QueryComponent::Select,
            Slot::TopXPostfix => QueryComponent::Postfix,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?} (role {:?} at {:?})", self.role(), self.location())
    }
}

#[derive(Clone)]
pub struct AggregateRequest<'s> {
    lines: Vec<CustomLine>,
    axis: Option<QueryAxis>,
    syntax: &'s dyn QuerySyntaxHelper,
}

impl fmt::Debug for AggregateRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateRequest")
            .field("lines", &self.lines)
            .field("axis", &self.axis)
            .field("database_type", &self.syntax.database_type())
            .finish()
    }
}

impl<'s> AggregateRequest<'s> {
    /// Fails unless the axis descriptor, the axis SELECT line and the axis
    /// GROUP BY line are either all present or all absent.
    pub fn new(
        lines: Vec<CustomLine>,
        axis: Option<QueryAxis>,
        syntax: &'s dyn QuerySyntaxHelper,
    ) -> Result<Self> {
        let request = Self {
            lines,
            axis,
            syntax,
        };

        let parts = [
            ("axis descriptor", request.axis.is_some()),
            ("axis SELECT line", request.axis_select()?.is_some()),
            ("axis GROUP BY line", request.axis_group_by()?.is_some()),
        ];
        let present = parts.iter().filter(|(_, p)| *p).count();
        if present != 0 && present != parts.len() {
            let missing: Vec<&str> = parts
                .iter()
                .filter(|(_, p)| !*p)
                .map(|(name, _)| *name)
                .collect();
            return Err(AggsynthError::Validation(format!(
                "axis aggregates need an axis descriptor plus Axis lines at QueryTimeColumn and GroupBy; missing {}",
                missing.join(", ")
            )));
        }

        Ok(request)
    }

    pub fn lines(&self) -> &[CustomLine] {
        &self.lines
    }

    pub fn axis(&self) -> Option<&QueryAxis> {
        self.axis.as_ref()
    }

    pub fn syntax(&self) -> &'s dyn QuerySyntaxHelper {
        self.syntax
    }

    pub fn slot(&self, slot: Slot) -> Result<Option<&CustomLine>> {
        Ok(self.slot_index(slot)?.map(|idx| &self.lines[idx]))
    }

    fn slot_index(&self, slot: Slot) -> Result<Option<usize>> {
        let matches: Vec<usize> = self
            .lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.is_in(slot.location(), slot.role()))
            .map(|(idx, _)| idx)
            .collect();
        match matches.as_slice() {
            [] => Ok(None),
            [idx] => Ok(Some(*idx)),
            many => Err(AggsynthError::AmbiguousSlot {
                slot,
                matches: many.len(),
            }),
        }
    }

    pub fn count_select(&self) -> Result<Option<&CustomLine>> {
        self.slot(Slot::CountSelect)
    }

    pub fn axis_select(&self) -> Result<Option<&CustomLine>> {
        self.slot(Slot::AxisSelect)
    }

    pub fn axis_group_by(&self) -> Result<Option<&CustomLine>> {
        self.slot(Slot::AxisGroupBy)
    }

    pub fn pivot_select(&self) -> Result<Option<&CustomLine>> {
        self.slot(Slot::PivotSelect)
    }

    pub fn top_x_order_by(&self) -> Result<Option<&CustomLine>> {
        self.slot(Slot::TopXOrderBy)
    }

    pub fn top_x_select(&self) -> Result<Option<&CustomLine>> {
        self.slot(Slot::TopXSelect)
    }

    pub fn top_x_postfix(&self) -> Result<Option<&CustomLine>> {
        self.slot(Slot::TopXPostfix)
    }

    /// Like [`slot`](Self::slot) but the line must exist.
    pub fn require(&self, slot: Slot, purpose: &str) -> Result<&CustomLine> {
        self.slot(slot)?.ok_or_else(|| {
            AggsynthError::Validation(format!(
                "{purpose} requires a {:?} line at {:?}",
                slot.role(),
                slot.location()
            ))
        })
    }

    /// New request with the line occupying `slot` replaced.
    pub fn replace_slot(&self, slot: Slot, line: CustomLine) -> Result<Self> {
        let idx = self.slot_index(slot)?.ok_or_else(|| {
            AggsynthError::Validation(format!("cannot replace missing {slot}"))
        })?;
        let mut lines = self.lines.clone();
        lines[idx] = line;
        Self::new(lines, self.axis.clone(), self.syntax)
    }

    /// Lines matching `keep`, in original order, newline-joined.
    pub fn join_lines(&self, keep: impl Fn(&CustomLine) -> bool) -> String {
        self.lines
            .iter()
            .filter(|line| keep(line))
            .map(CustomLine::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn any_line(&self, keep: impl Fn(&CustomLine) -> bool) -> bool {
        self.lines.iter().any(keep)
    }
}
