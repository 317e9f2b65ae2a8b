//! Type lowering descriptors and the per-module registry that caches them.
//!
//! A `TypeInfo` knows how values of one source type are laid out in memory
//! and how they move between memory, explosions and rvalues. Descriptors are
//! computed on first use and shared through `Rc`; they never change after
//! construction.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use kestrel_ir::builder::Builder;
use kestrel_ir::instruction::Origin;
use kestrel_ir::types::Type;
use kestrel_ir::value::InstRef;
use tracing::debug;

use crate::ast::{TypeId, TypeKind, TypeTable};
use crate::config::{IrGenOptions, TargetLayout};
use crate::explosion::{Explosion, ExplosionKind};
use crate::func::FuncTypeInfo;
use crate::rvalue::{Address, RValue, alignment_at_offset};
use crate::schema::Schema;

#[derive(Debug)]
pub struct FieldInfo {
    pub info: Rc<TypeInfo>,
    /// Byte offset from the start of the enclosing record.
    pub offset: u64,
}

#[derive(Debug)]
pub enum TypeInfoKind {
    /// A single machine scalar.
    Primitive,
    /// Tuple or struct, laid out field by field with natural padding.
    Record(Vec<FieldInfo>),
    /// Two-word closure.
    Function(FuncTypeInfo),
}

/// Lowering descriptor for one source type.
#[derive(Debug)]
pub struct TypeInfo {
    pub source: TypeId,
    /// In-memory representation.
    pub storage_type: Type,
    pub size: u64,
    pub align: u64,
    pub schema: Schema,
    pub kind: TypeInfoKind,
}

impl TypeInfo {
    pub fn as_function(&self) -> &FuncTypeInfo {
        match &self.kind {
            TypeInfoKind::Function(info) => info,
            _ => panic!("type #{} is not a function type", self.source.index()),
        }
    }

    /// Record fields; empty for non-records.
    pub fn fields(&self) -> &[FieldInfo] {
        match &self.kind {
            TypeInfoKind::Record(fields) => fields,
            _ => &[],
        }
    }

    /// Address of field `index` of the record stored at `base`.
    pub fn field_address(&self, b: &mut Builder<'_>, base: Address, index: usize) -> Address {
        let offset = self.fields()[index].offset;
        let addr = b.field_addr(
            base.addr,
            self.storage_type.clone(),
            index as u32,
            Origin::synthetic(),
        );
        Address::new(addr, alignment_at_offset(base.align, offset))
    }

    /// Load a value from `src` into `out`, exploded in `out`'s kind.
    pub fn load(&self, b: &mut Builder<'_>, src: Address, out: &mut Explosion) {
        match &self.kind {
            TypeInfoKind::Primitive => {
                let v = b.load(src.addr, self.storage_type.clone(), src.align, Origin::synthetic());
                out.add(v);
            }
            TypeInfoKind::Function(info) => info.load(b, src, out),
            TypeInfoKind::Record(fields) => {
                if self.schema.is_aggregate() && out.kind() == ExplosionKind::Minimal {
                    out.add(src.addr);
                    return;
                }
                for (i, field) in fields.iter().enumerate() {
                    let addr = self.field_address(b, src, i);
                    field.info.load(b, addr, out);
                }
            }
        }
    }

    /// Store a value claimed from `src` (in `src`'s kind) to `dest`.
    pub fn store(&self, b: &mut Builder<'_>, src: &mut Explosion, dest: Address) {
        match &self.kind {
            TypeInfoKind::Primitive => {
                b.store(src.claim_next(), dest.addr, dest.align, Origin::synthetic());
            }
            TypeInfoKind::Function(info) => info.store(b, src, dest),
            TypeInfoKind::Record(fields) => {
                if self.schema.is_aggregate() && src.kind() == ExplosionKind::Minimal {
                    let from = Address::new(src.claim_next(), self.align);
                    self.copy(b, from, dest);
                    return;
                }
                for (i, field) in fields.iter().enumerate() {
                    let addr = self.field_address(b, dest, i);
                    field.info.store(b, src, addr);
                }
            }
        }
    }

    /// Copy a value between two memory locations, leaf scalar by leaf scalar.
    pub fn copy(&self, b: &mut Builder<'_>, src: Address, dest: Address) {
        let mut tmp = Explosion::new(ExplosionKind::Maximal);
        self.load(b, src, &mut tmp);
        self.store(b, &mut tmp, dest);
        tmp.finish("aggregate copy");
    }

    /// Read the value at `src` as an rvalue. Aggregates are not loaded.
    pub fn load_rvalue(&self, b: &mut Builder<'_>, src: Address) -> RValue {
        if self.schema.is_aggregate() {
            return RValue::Aggregate(src.addr);
        }
        let mut values = Explosion::new(ExplosionKind::Minimal);
        self.load(b, src, &mut values);
        RValue::Scalars(values.claim_all())
    }

    pub fn store_rvalue(&self, b: &mut Builder<'_>, value: RValue, dest: Address) {
        self.check_rvalue(&value);
        let mut src = Explosion::new(ExplosionKind::Minimal);
        value.add_to(&mut src);
        self.store(b, &mut src, dest);
        src.finish("rvalue store");
    }

    /// Append `value` to `out`. A maximal explosion of an aggregate loads
    /// its leaf scalars.
    pub fn explode(&self, b: &mut Builder<'_>, value: RValue, out: &mut Explosion) {
        self.check_rvalue(&value);
        match value {
            RValue::Aggregate(addr) if out.kind() == ExplosionKind::Maximal => {
                self.load(b, Address::new(addr, self.align), out);
            }
            value => value.add_to(out),
        }
    }

    /// Claim one value from `src` and reassemble it as an rvalue. Imploding
    /// a maximal explosion of an aggregate materializes it in a fresh slot
    /// placed before `alloca_point`.
    pub fn implode(&self, b: &mut Builder<'_>, alloca_point: InstRef, src: &mut Explosion) -> RValue {
        match (&self.schema, src.kind()) {
            (Schema::Aggregate { .. }, ExplosionKind::Maximal) => {
                let slot = b.stack_slot_before(
                    alloca_point,
                    self.storage_type.clone(),
                    self.align,
                    Origin::synthetic(),
                );
                self.store(b, src, Address::new(slot, self.align));
                RValue::Aggregate(slot)
            }
            (Schema::Scalars(types), ExplosionKind::Maximal) => RValue::Scalars(src.claim(types.len())),
            (schema, ExplosionKind::Minimal) => RValue::claim(schema, src),
        }
    }

    /// Field `index` of a record rvalue.
    pub fn project_field(&self, b: &mut Builder<'_>, value: &RValue, index: usize) -> RValue {
        let fields = match &self.kind {
            TypeInfoKind::Record(fields) => fields,
            _ => panic!("field projection on non-record type #{}", self.source.index()),
        };
        assert!(
            index < fields.len(),
            "field {index} out of range for a record of {} fields",
            fields.len()
        );
        self.check_rvalue(value);
        match value {
            RValue::Scalars(values) => {
                let start: usize = fields[..index]
                    .iter()
                    .map(|f| f.info.schema.minimal_len())
                    .sum();
                let len = fields[index].info.schema.minimal_len();
                RValue::Scalars(values[start..start + len].to_vec())
            }
            RValue::Aggregate(addr) => {
                let field_addr = self.field_address(b, Address::new(*addr, self.align), index);
                fields[index].info.load_rvalue(b, field_addr)
            }
        }
    }

    fn check_rvalue(&self, value: &RValue) {
        match (&self.schema, value) {
            (Schema::Aggregate { .. }, RValue::Aggregate(_)) => {}
            (Schema::Scalars(types), RValue::Scalars(values)) if types.len() == values.len() => {}
            (schema, value) => panic!(
                "schema mismatch for type #{}: {schema:?} cannot hold {value:?}",
                self.source.index()
            ),
        }
    }
}

/// Registry of lowering descriptors for one compilation unit.
pub struct TypeConverter<'p> {
    table: &'p TypeTable,
    layout: TargetLayout,
    max_scalars: usize,
    cache: RefCell<HashMap<TypeId, Rc<TypeInfo>>>,
}

impl<'p> TypeConverter<'p> {
    pub fn new(table: &'p TypeTable, options: &IrGenOptions) -> Self {
        Self {
            table,
            layout: options.layout,
            max_scalars: options.max_scalars,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn table(&self) -> &'p TypeTable {
        self.table
    }

    pub fn layout(&self) -> &TargetLayout {
        &self.layout
    }

    /// Descriptor for `ty`, computed on first request.
    pub fn get(&self, ty: TypeId) -> Rc<TypeInfo> {
        if let Some(info) = self.cache.borrow().get(&ty) {
            return Rc::clone(info);
        }
        // Computing a record recurses into its fields, so the cache must not
        // stay borrowed here.
        let info = Rc::new(self.convert(ty));
        debug!(
            ty = ty.index(),
            storage = %info.storage_type,
            size = info.size,
            align = info.align,
            schema = ?info.schema,
            "lowered source type"
        );
        Rc::clone(self.cache.borrow_mut().entry(ty).or_insert(info))
    }

    pub fn schema(&self, ty: TypeId) -> Schema {
        self.get(ty).schema.clone()
    }

    /// Number of descriptors computed so far.
    pub fn len(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.borrow().is_empty()
    }

    fn convert(&self, ty: TypeId) -> TypeInfo {
        match self.table.get(ty) {
            TypeKind::Int(bits) => {
                let size = u64::from(bits.div_ceil(8).max(1).next_power_of_two());
                primitive(ty, Type::Int(*bits), size)
            }
            TypeKind::Float(float) => primitive(ty, Type::Float(*float), float.bytes()),
            TypeKind::Bool => primitive(ty, Type::I1, 1),
            TypeKind::Tuple(elems) => self.record(ty, elems),
            TypeKind::Struct { fields, .. } => self.record(ty, fields),
            TypeKind::Function { input, result } => {
                let layout = self.layout();
                TypeInfo {
                    source: ty,
                    storage_type: FuncTypeInfo::closure_type(),
                    size: 2 * layout.pointer_size,
                    align: layout.pointer_align,
                    schema: Schema::Scalars(vec![Type::PTR, Type::PTR]),
                    kind: TypeInfoKind::Function(FuncTypeInfo::new(
                        *input,
                        *result,
                        layout.pointer_size,
                    )),
                }
            }
        }
    }

    fn record(&self, ty: TypeId, field_types: &[TypeId]) -> TypeInfo {
        let mut fields = Vec::with_capacity(field_types.len());
        let mut scalars = Vec::new();
        let mut all_scalar = true;
        let mut offset = 0;
        let mut align = 1;
        for &field_ty in field_types {
            let info = self.get(field_ty);
            offset = align_to(offset, info.align);
            align = align.max(info.align);
            match info.schema.scalars() {
                Some(types) => scalars.extend_from_slice(types),
                None => all_scalar = false,
            }
            let size = info.size;
            fields.push(FieldInfo { info, offset });
            offset += size;
        }
        let storage_type = Type::Struct(
            fields
                .iter()
                .map(|f| f.info.storage_type.clone())
                .collect(),
        );
        let schema = if all_scalar && scalars.len() <= self.max_scalars {
            Schema::Scalars(scalars)
        } else {
            Schema::Aggregate {
                ty: storage_type.clone(),
                align,
            }
        };
        TypeInfo {
            source: ty,
            storage_type,
            size: align_to(offset, align),
            align,
            schema,
            kind: TypeInfoKind::Record(fields),
        }
    }
}

fn primitive(source: TypeId, storage_type: Type, size: u64) -> TypeInfo {
    TypeInfo {
        source,
        schema: Schema::Scalars(vec![storage_type.clone()]),
        storage_type,
        size,
        align: size,
        kind: TypeInfoKind::Primitive,
    }
}

fn align_to(offset: u64, align: u64) -> u64 {
    offset.div_ceil(align) * align
}
