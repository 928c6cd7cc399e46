//! Pointer and length operand rewriting
//!
//! The core of the pass: replaces a single pointer-typed operand with a
//! provably bounded pointer, and masks the length operands of bulk
//! memory operations.

use crate::ir::{Function, GlobalId, InstId, Opcode, Type, ValueId, ValueKind};

use super::SandboxMemoryAccesses;

/// Recognized add-then-cast shape feeding a first-class access
struct FoldedOffset {
    /// The 32-bit value the earlier address expansion added the offset to
    base: ValueId,
    /// The non-negative constant offset
    offset: i64,
    /// The `inttoptr` whose result the access consumes
    cast: InstId,
    /// The `add` feeding the cast
    add: InstId,
}

fn emit(
    func: &mut Function,
    block: usize,
    pos: &mut usize,
    opcode: Opcode,
    operands: Vec<ValueId>,
    ty: Type,
) -> (InstId, ValueId) {
    let inst = func.insert_inst(block, *pos, opcode, operands, Some(ty));
    *pos += 1;
    let result = func.result(inst);
    (inst, result)
}

impl SandboxMemoryAccesses {
    /// Replace the pointer operand `op_idx` of `inst` with a bounded
    /// pointer of the same pointee type.
    ///
    /// The general lowering truncates the pointer to 32 bits, masks it if
    /// the subspace is smaller than 32 bits, zero-extends to 64 bits,
    /// adds the function's shared base value, and casts back:
    ///
    /// ```text
    /// %t = ptrtoint <type>* %ptr to i32
    /// %m = and i32 %t, <mask>              ; only when W < 32
    /// %e = zext i32 %m to i64
    /// %s = add i64 %mem_base, %e
    /// %p = inttoptr i64 %s to <type>*
    /// ```
    ///
    /// For first-class accesses whose pointer is the add-then-cast shape
    /// left by the earlier address expansion:
    ///
    /// ```text
    /// %0 = add i32 %x, <const>             ; signed, must be >= 0
    /// %ptr = inttoptr i32 %0 to <type>*
    /// ```
    ///
    /// the already-computed `%x` is reused and the constant is re-added
    /// after the base, saving the truncation:
    ///
    /// ```text
    /// %m = and i32 %x, <mask>              ; only when W < 32
    /// %e = zext i32 %m to i64
    /// %s = add i64 %mem_base, %e
    /// %o = add i64 %s, <const>             ; extended to i64
    /// %p = inttoptr i64 %o to <type>*
    /// ```
    ///
    /// Because the constant is added after the mask, the access may land
    /// up to one subspace size past the region; this is sound only
    /// because the runtime backs the region with an equally sized guard
    /// region.
    #[allow(clippy::too_many_arguments)]
    pub(super) fn sandbox_ptr_operand(
        &self,
        func: &mut Function,
        block: usize,
        inst: InstId,
        op_idx: usize,
        first_class: bool,
        mem_base: &mut Option<ValueId>,
        mem_base_global: GlobalId,
    ) {
        // The function must first acquire the region base from the
        // imported global. The load is synthesized once, at the start of
        // the entry block, on the first sandboxing site.
        let mem_base_value = match *mem_base {
            Some(value) => value,
            None => {
                let addr = func.global_addr(mem_base_global, Type::I64);
                let load = func.insert_inst(0, 0, Opcode::Load, vec![addr], Some(Type::I64));
                let value = func.result(load);
                *mem_base = Some(value);
                value
            }
        };

        let mut pos = match func.position(block, inst) {
            Some(pos) => pos,
            None => return,
        };
        let ptr = func.inst(inst).operands[op_idx];
        let ptr_ty = func.value(ptr).ty.clone();

        let folded = if first_class {
            self.recognize_folded_offset(func, ptr, &ptr_ty)
        } else {
            None
        };

        // Without the folded shape, start by truncating the pointer to
        // a 32-bit integer.
        let mut truncated = match &folded {
            Some(fold) => fold.base,
            None => {
                let (_, value) = emit(func, block, &mut pos, Opcode::PtrToInt, vec![ptr], Type::I32);
                value
            }
        };

        // Subspaces below 32 bits truncate further with a bit mask.
        if let Some(mask) = self.mask() {
            let mask_value = func.const_i32(mask as i32);
            let (_, value) = emit(
                func,
                block,
                &mut pos,
                Opcode::And,
                vec![truncated, mask_value],
                Type::I32,
            );
            truncated = value;
        }

        // Zero-extend back to 64 bits and shift into the region.
        let (_, extended) = emit(func, block, &mut pos, Opcode::ZExt, vec![truncated], Type::I64);
        let (_, based) = emit(
            func,
            block,
            &mut pos,
            Opcode::Add,
            vec![mem_base_value, extended],
            Type::I64,
        );
        let (offset_add, addr) = match &folded {
            Some(fold) => {
                let offset_value = func.const_i64(fold.offset);
                let (id, value) = emit(
                    func,
                    block,
                    &mut pos,
                    Opcode::Add,
                    vec![based, offset_value],
                    Type::I64,
                );
                (Some(id), value)
            }
            None => (None, based),
        };
        let (sandboxed, new_ptr) = emit(func, block, &mut pos, Opcode::IntToPtr, vec![addr], ptr_ty);

        func.set_operand(inst, op_idx, new_ptr);

        if let Some(fold) = folded {
            // The replaced instructions keep their source locations alive
            // through their structural replacements.
            if let Some(offset_add) = offset_add {
                func.copy_loc(offset_add, fold.add);
            }
            func.copy_loc(sandboxed, fold.cast);

            // Erase order matters: the add may still be referenced by the
            // not-yet-erased cast.
            if func.result_unused(fold.cast) {
                func.erase_inst(fold.cast);
            }
            if func.result_unused(fold.add) {
                func.erase_inst(fold.add);
            }
        }
    }

    /// Recognize the folded-offset shape behind `ptr`, if its constant is
    /// non-negative and the access cannot reach past the guard region.
    fn recognize_folded_offset(
        &self,
        func: &Function,
        ptr: ValueId,
        ptr_ty: &Type,
    ) -> Option<FoldedOffset> {
        let pointee = ptr_ty.pointee()?;
        let cast = func.defining_inst(ptr)?;
        if func.inst(cast).opcode != Opcode::IntToPtr {
            return None;
        }
        let int_value = func.inst(cast).operands[0];
        if func.value(int_value).ty != Type::I32 {
            return None;
        }
        let add = func.defining_inst(int_value)?;
        if func.inst(add).opcode != Opcode::Add {
            return None;
        }
        let rhs = func.value(func.inst(add).operands[1]);
        let offset = match rhs.kind {
            ValueKind::Const(offset) => offset,
            _ => return None,
        };
        let max_offset = self.address_subspace_size() as i64 - pointee.store_size() as i64;
        if offset < 0 || offset > max_offset {
            return None;
        }
        Some(FoldedOffset {
            base: func.inst(add).operands[0],
            offset,
            cast,
            add,
        })
    }

    /// Mask the 32-bit length operand `op_idx` of `inst`.
    ///
    /// Bounds the size argument of bulk memory operations so that a
    /// bounded start address plus the length cannot name memory past the
    /// guard region. No-op when the full 32-bit subspace is in use.
    pub(super) fn sandbox_len_operand(
        &self,
        func: &mut Function,
        block: usize,
        inst: InstId,
        op_idx: usize,
    ) {
        if let Some(mask) = self.mask() {
            let mut pos = match func.position(block, inst) {
                Some(pos) => pos,
                None => return,
            };
            let len = func.inst(inst).operands[op_idx];
            let mask_value = func.const_i32(mask as i32);
            let (_, masked) = emit(
                func,
                block,
                &mut pos,
                Opcode::And,
                vec![len, mask_value],
                Type::I32,
            );
            func.set_operand(inst, op_idx, masked);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folded_load_func(offset: i32, loaded: Type) -> Function {
        let mut func = Function::new("f", vec![Type::I32]);
        let x = func.arg(0);
        let c = func.const_i32(offset);
        let add = func.push_inst(0, Opcode::Add, vec![x, c], Some(Type::I32));
        let add_v = func.result(add);
        let cast = func.push_inst(
            0,
            Opcode::IntToPtr,
            vec![add_v],
            Some(Type::ptr_to(loaded.clone())),
        );
        let cast_v = func.result(cast);
        func.push_inst(0, Opcode::Load, vec![cast_v], Some(loaded));
        func
    }

    fn load_ptr(func: &Function) -> ValueId {
        // Last instruction of the entry block is the load under test.
        let inst = *func.blocks[0].insts.last().unwrap();
        func.inst(inst).operands[0]
    }

    #[test]
    fn test_folded_offset_recognized() {
        let pass = SandboxMemoryAccesses::new(10).unwrap();
        let func = folded_load_func(16, Type::I32);
        let fold = pass
            .recognize_folded_offset(&func, load_ptr(&func), &Type::ptr_to(Type::I32))
            .expect("16 + 4 fits in a 1024-byte subspace");
        assert_eq!(fold.offset, 16);
    }

    #[test]
    fn test_negative_offset_not_folded() {
        let pass = SandboxMemoryAccesses::new(10).unwrap();
        let func = folded_load_func(-4, Type::I32);
        assert!(pass
            .recognize_folded_offset(&func, load_ptr(&func), &Type::ptr_to(Type::I32))
            .is_none());
    }

    #[test]
    fn test_offset_at_subspace_boundary() {
        let pass = SandboxMemoryAccesses::new(10).unwrap();

        // 1020 + sizeof(i32) == 1024: still foldable.
        let func = folded_load_func(1020, Type::I32);
        assert!(pass
            .recognize_folded_offset(&func, load_ptr(&func), &Type::ptr_to(Type::I32))
            .is_some());

        // 1021 + sizeof(i32) > 1024: falls back to the general path.
        let func = folded_load_func(1021, Type::I32);
        assert!(pass
            .recognize_folded_offset(&func, load_ptr(&func), &Type::ptr_to(Type::I32))
            .is_none());
    }

    #[test]
    fn test_wider_pointee_shrinks_max_offset() {
        let pass = SandboxMemoryAccesses::new(10).unwrap();
        let func = folded_load_func(1020, Type::I64);
        assert!(pass
            .recognize_folded_offset(&func, load_ptr(&func), &Type::ptr_to(Type::I64))
            .is_none());
    }

    #[test]
    fn test_non_add_producer_not_folded() {
        let pass = SandboxMemoryAccesses::new(10).unwrap();
        let mut func = Function::new("f", vec![Type::I32]);
        let x = func.arg(0);
        let cast = func.push_inst(
            0,
            Opcode::IntToPtr,
            vec![x],
            Some(Type::ptr_to(Type::I32)),
        );
        let cast_v = func.result(cast);
        func.push_inst(0, Opcode::Load, vec![cast_v], Some(Type::I32));
        assert!(pass
            .recognize_folded_offset(&func, load_ptr(&func), &Type::ptr_to(Type::I32))
            .is_none());
    }

    #[test]
    fn test_non_constant_offset_not_folded() {
        let pass = SandboxMemoryAccesses::new(10).unwrap();
        let mut func = Function::new("f", vec![Type::I32, Type::I32]);
        let x = func.arg(0);
        let y = func.arg(1);
        let add = func.push_inst(0, Opcode::Add, vec![x, y], Some(Type::I32));
        let add_v = func.result(add);
        let cast = func.push_inst(
            0,
            Opcode::IntToPtr,
            vec![add_v],
            Some(Type::ptr_to(Type::I32)),
        );
        let cast_v = func.result(cast);
        func.push_inst(0, Opcode::Load, vec![cast_v], Some(Type::I32));
        assert!(pass
            .recognize_folded_offset(&func, load_ptr(&func), &Type::ptr_to(Type::I32))
            .is_none());
    }
}
