//! Typed, pre-allocated argument storage for captured invocations.
//!
//! A contract's methods are described by `MethodSignature`s. From them an
//! `ArgumentLayout` works out how many cells of each argument type a slot
//! needs (the largest number of arguments of that type any single method
//! takes) and, for each method, which cell every argument goes to. Writing
//! and reading a captured call then only moves values in and out of cells
//! that already exist.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::EventError;

/// Identifies a contract method; assigned in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MethodId(pub u16);

pub(crate) trait ArgumentCell: Send {
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn clear(&mut self);
    fn is_set(&self) -> bool;
}

impl<T: Send + 'static> ArgumentCell for Option<T> {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn clear(&mut self) {
        *self = None;
    }

    fn is_set(&self) -> bool {
        self.is_some()
    }
}

fn type_id_of<T: 'static>() -> TypeId {
    TypeId::of::<T>()
}

fn type_name_of<T>() -> &'static str {
    std::any::type_name::<T>()
}

fn new_cell<T: Send + 'static>() -> Box<dyn ArgumentCell> {
    Box::new(None::<T>)
}

/// Runtime description of one parameter type.
#[derive(Clone, Copy)]
pub struct ArgumentType {
    type_id: fn() -> TypeId,
    type_name: fn() -> &'static str,
    new_cell: fn() -> Box<dyn ArgumentCell>,
}

impl ArgumentType {
    pub const fn of<T: Send + 'static>() -> Self {
        Self {
            type_id: type_id_of::<T>,
            type_name: type_name_of::<T>,
            new_cell: new_cell::<T>,
        }
    }

    pub fn type_id(&self) -> TypeId {
        (self.type_id)()
    }

    pub fn type_name(&self) -> &'static str {
        (self.type_name)()
    }
}

impl PartialEq for ArgumentType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id() == other.type_id()
    }
}

impl Eq for ArgumentType {}

impl fmt::Debug for ArgumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Name and parameter types of one contract method.
#[derive(Debug, Clone, Copy)]
pub struct MethodSignature {
    name: &'static str,
    arguments: &'static [ArgumentType],
}

impl MethodSignature {
    pub const fn new(name: &'static str, arguments: &'static [ArgumentType]) -> Self {
        Self { name, arguments }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn arguments(&self) -> &'static [ArgumentType] {
        self.arguments
    }
}

/// For every parameter type used by `methods`, the largest number of
/// parameters of that type taken by a single method.
pub fn parameter_type_counts(methods: &[MethodSignature]) -> HashMap<TypeId, usize> {
    let mut counts: HashMap<TypeId, usize> = HashMap::new();
    for method in methods {
        let mut per_method: HashMap<TypeId, usize> = HashMap::new();
        for argument in method.arguments {
            *per_method.entry(argument.type_id()).or_default() += 1;
        }
        for (type_id, count) in per_method {
            let max = counts.entry(type_id).or_default();
            *max = (*max).max(count);
        }
    }
    counts
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CellIndex {
    type_index: usize,
    ordinal: usize,
}

/// Cell layout shared by every slot serving one contract.
pub struct ArgumentLayout {
    contract: &'static str,
    types: Vec<ArgumentType>,
    capacities: Vec<usize>,
    plans: Vec<Box<[CellIndex]>>,
}

impl ArgumentLayout {
    pub fn new(contract: &'static str, methods: &[MethodSignature]) -> Self {
        let counts = parameter_type_counts(methods);

        let mut types: Vec<ArgumentType> = Vec::new();
        let mut index_of: HashMap<TypeId, usize> = HashMap::new();
        for argument in methods.iter().flat_map(|m| m.arguments) {
            index_of.entry(argument.type_id()).or_insert_with(|| {
                types.push(*argument);
                types.len() - 1
            });
        }

        let capacities = types
            .iter()
            .map(|t| counts.get(&t.type_id()).copied().unwrap_or(0))
            .collect();

        let plans = methods
            .iter()
            .map(|method| {
                let mut next_ordinal = vec![0usize; types.len()];
                method
                    .arguments
                    .iter()
                    .map(|argument| {
                        let type_index = index_of.get(&argument.type_id()).copied().unwrap_or(0);
                        let ordinal = next_ordinal[type_index];
                        next_ordinal[type_index] += 1;
                        CellIndex { type_index, ordinal }
                    })
                    .collect()
            })
            .collect();

        Self {
            contract,
            types,
            capacities,
            plans,
        }
    }

    pub fn contract(&self) -> &'static str {
        self.contract
    }

    /// Cells reserved per slot for arguments of type `T`.
    pub fn capacity_of<T: 'static>(&self) -> usize {
        let wanted = TypeId::of::<T>();
        self.types
            .iter()
            .position(|t| t.type_id() == wanted)
            .map_or(0, |i| self.capacities[i])
    }

    /// Total cells per slot.
    pub fn cell_count(&self) -> usize {
        self.capacities.iter().sum()
    }

    pub fn method_count(&self) -> usize {
        self.plans.len()
    }

    fn plan(&self, method: MethodId) -> &[CellIndex] {
        self.plans.get(method.0 as usize).map_or(&[][..], |p| &p[..])
    }

    fn new_cells(&self) -> Vec<Vec<Box<dyn ArgumentCell>>> {
        self.types
            .iter()
            .zip(&self.capacities)
            .map(|(t, &capacity)| (0..capacity).map(|_| (t.new_cell)()).collect())
            .collect()
    }
}

impl fmt::Debug for ArgumentLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (t, capacity) in self.types.iter().zip(&self.capacities) {
            map.entry(&t.type_name(), capacity);
        }
        map.finish()
    }
}

/// The argument cells of one slot.
///
/// Cells are built once per layout, normally by `prepare` when the proxy is
/// created, and reused on every later lap.
#[derive(Default)]
pub struct ArgumentHolder {
    layout: Option<Arc<ArgumentLayout>>,
    cells: Vec<Vec<Box<dyn ArgumentCell>>>,
}

impl ArgumentHolder {
    /// Build the cells for `layout` unless they already are.
    pub fn prepare(&mut self, layout: &Arc<ArgumentLayout>) {
        if self.layout.as_ref().is_some_and(|l| Arc::ptr_eq(l, layout)) {
            return;
        }
        self.cells = layout.new_cells();
        self.layout = Some(layout.clone());
    }

    pub fn writer<'a>(&'a mut self, layout: &Arc<ArgumentLayout>, method: MethodId) -> ArgumentWriter<'a> {
        self.prepare(layout);

        let plan = self.layout.as_deref().map_or(&[][..], |l| l.plan(method));
        ArgumentWriter {
            cells: &mut self.cells,
            plan,
            position: 0,
        }
    }

    pub fn reader(&mut self, method: MethodId) -> ArgumentReader<'_> {
        let (contract, plan) = match self.layout.as_deref() {
            Some(layout) => (layout.contract(), layout.plan(method)),
            None => ("<unprepared slot>", &[][..]),
        };
        ArgumentReader {
            cells: &mut self.cells,
            plan,
            position: 0,
            contract,
            method,
        }
    }

    /// Drop any argument still held, keeping the cells.
    pub fn clear(&mut self) {
        for cell in self.cells.iter_mut().flatten() {
            cell.clear();
        }
    }

    pub fn layout(&self) -> Option<&Arc<ArgumentLayout>> {
        self.layout.as_ref()
    }

    /// Cells currently holding a value.
    pub fn occupied(&self) -> usize {
        self.cells.iter().flatten().filter(|c| c.is_set()).count()
    }
}

impl fmt::Debug for ArgumentHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_argument_holder(self, f)
    }
}

fn cell_at<'c, T: 'static>(
    cells: &'c mut [Vec<Box<dyn ArgumentCell>>],
    index: CellIndex,
) -> Option<&'c mut Option<T>> {
    cells
        .get_mut(index.type_index)?
        .get_mut(index.ordinal)?
        .as_any_mut()
        .downcast_mut::<Option<T>>()
}

/// Stores one call's arguments, in declaration order.
pub struct ArgumentWriter<'a> {
    cells: &'a mut [Vec<Box<dyn ArgumentCell>>],
    plan: &'a [CellIndex],
    position: usize,
}

impl ArgumentWriter<'_> {
    pub fn push<T: Send + 'static>(&mut self, value: T) {
        let Some(&index) = self.plan.get(self.position) else {
            debug_assert!(false, "more arguments than the method declares");
            return;
        };
        self.position += 1;
        match cell_at::<T>(self.cells, index) {
            Some(cell) => *cell = Some(value),
            None => debug_assert!(false, "argument type does not match the contract layout"),
        }
    }
}

/// Takes one call's arguments back out, in declaration order.
pub struct ArgumentReader<'a> {
    cells: &'a mut [Vec<Box<dyn ArgumentCell>>],
    plan: &'a [CellIndex],
    position: usize,
    contract: &'static str,
    method: MethodId,
}

impl ArgumentReader<'_> {
    pub fn next<T: Send + 'static>(&mut self) -> Result<T, EventError> {
        let position = self.position;
        self.position += 1;
        self.plan
            .get(position)
            .and_then(|&index| cell_at::<T>(self.cells, index))
            .and_then(Option::take)
            .ok_or(EventError::MissingArgument {
                contract: self.contract,
                method: self.method.0,
                index: position,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static METHODS: &[MethodSignature] = &[
        MethodSignature::new("one", {
            const ARGS: &[ArgumentType] = &[ArgumentType::of::<String>()];
            ARGS
        }),
        MethodSignature::new("two", {
            const ARGS: &[ArgumentType] = &[ArgumentType::of::<String>(), ArgumentType::of::<i32>()];
            ARGS
        }),
        MethodSignature::new("three", {
            const ARGS: &[ArgumentType] =
                &[ArgumentType::of::<i32>(), ArgumentType::of::<i32>(), ArgumentType::of::<i32>()];
            ARGS
        }),
        MethodSignature::new("four", {
            const ARGS: &[ArgumentType] = &[ArgumentType::of::<u64>(), ArgumentType::of::<f64>()];
            ARGS
        }),
    ];

    #[test]
    fn counts_the_widest_use_of_each_type() {
        let counts = parameter_type_counts(METHODS);
        assert_eq!(counts.len(), 4);
        assert_eq!(counts[&TypeId::of::<String>()], 1);
        assert_eq!(counts[&TypeId::of::<i32>()], 3);
        assert_eq!(counts[&TypeId::of::<u64>()], 1);
        assert_eq!(counts[&TypeId::of::<f64>()], 1);
    }

    #[test]
    fn layout_reserves_cells_per_type() {
        let layout = ArgumentLayout::new("Sample", METHODS);
        assert_eq!(layout.capacity_of::<i32>(), 3);
        assert_eq!(layout.capacity_of::<bool>(), 0);
        assert_eq!(layout.cell_count(), 6);
        assert_eq!(layout.method_count(), 4);
    }

    #[test]
    fn arguments_come_back_in_order() {
        let layout = Arc::new(ArgumentLayout::new("Sample", METHODS));
        let mut holder = ArgumentHolder::default();

        let mut writer = holder.writer(&layout, MethodId(2));
        writer.push(7i32);
        writer.push(8i32);
        writer.push(9i32);
        assert_eq!(holder.occupied(), 3);

        let mut reader = holder.reader(MethodId(2));
        let values: Vec<i32> = (0..3).map(|_| reader.next::<i32>().unwrap()).collect();
        assert_eq!(values, vec![7, 8, 9]);
        assert_eq!(holder.occupied(), 0);
    }

    #[test]
    fn prepared_cells_are_kept_by_the_writer() {
        let layout = Arc::new(ArgumentLayout::new("Sample", METHODS));
        let mut holder = ArgumentHolder::default();
        holder.prepare(&layout);
        assert!(holder.layout().is_some_and(|l| Arc::ptr_eq(l, &layout)));

        let first = &*holder.cells[1][0] as *const dyn ArgumentCell as *const ();
        holder.writer(&layout, MethodId(2)).push(5i32);
        let second = &*holder.cells[1][0] as *const dyn ArgumentCell as *const ();
        assert_eq!(first, second);
        assert_eq!(holder.occupied(), 1);
    }

    #[test]
    fn missing_argument_is_reported() {
        let layout = Arc::new(ArgumentLayout::new("Sample", METHODS));
        let mut holder = ArgumentHolder::default();
        holder.writer(&layout, MethodId(0));

        let err = holder.reader(MethodId(0)).next::<String>().unwrap_err();
        assert!(matches!(err, EventError::MissingArgument { method: 0, index: 0, .. }));
    }

    #[test]
    fn clear_keeps_cells_but_drops_values() {
        let layout = Arc::new(ArgumentLayout::new("Sample", METHODS));
        let mut holder = ArgumentHolder::default();
        let mut writer = holder.writer(&layout, MethodId(1));
        writer.push("a".to_string());
        writer.push(1i32);
        holder.clear();
        assert_eq!(holder.occupied(), 0);
        assert!(holder.layout().is_some_and(|l| Arc::ptr_eq(l, &layout)));
    }
}
