//! The library-tracking facade and the registry that selects the active
//! implementation.

use std::io;

use crate::objfile::ObjectFile;
use crate::relocate;
use crate::solib::{self, LibraryProvider, Solib, TargetSection};

/// Hooks into the debugger's object-file and symbol machinery.
pub trait SymfileBackend {
    /// Open the object file for a library, by the name the target reported.
    /// This is the debugger's generic open path (search directories,
    /// sysroot remapping, ...), not something this crate decides.
    fn open_object_file(&mut self, name: &str) -> io::Result<Box<dyn ObjectFile>>;

    /// Does `pc` fall inside a procedure-linkage-table section of any
    /// currently loaded object file?
    fn in_plt_section(&self, pc: u64) -> bool;
}

/// The operations a library-tracking implementation provides to the
/// debugger's generic solib machinery.
pub trait SolibOps {
    /// Enumerate the libraries currently loaded into the inferior, in the
    /// order the target reports them. Empty when the target has nothing to
    /// report or its report cannot be parsed.
    fn current_sos(&mut self) -> Vec<Solib>;

    /// Adjust `sec`'s addresses to where the target actually placed them.
    fn relocate_section_addresses(&mut self, so: &mut Solib, sec: &mut TargetSection);

    /// Release a library node once the generic machinery is done with it.
    fn free_so(&mut self, so: Solib);

    /// Hook run when a new inferior is created.
    fn create_inferior_hook(&mut self, from_tty: bool);

    /// Forget any per-inferior library state.
    fn clear_solib(&mut self);

    /// Try to locate the main executable's symbol file from target
    /// knowledge alone. Returns `true` on success.
    fn open_symbol_file_object(&mut self, from_tty: bool) -> bool;

    /// Is `pc` inside the dynamic linker's resolver code?
    fn in_dynsym_resolve_code(&mut self, pc: u64) -> bool;

    /// Open the object file backing a library.
    fn open_object_file(&mut self, name: &str) -> io::Result<Box<dyn ObjectFile>>;
}

/// [`SolibOps`] for targets that report their own library list.
///
/// `T` fetches the raw library-list document; `B` supplies the debugger's
/// object-file and symbol services.
pub struct TargetSolibOps<T, B> {
    target: T,
    backend: B,
}

impl<T: LibraryProvider, B: SymfileBackend> TargetSolibOps<T, B> {
    pub fn new(target: T, backend: B) -> Self {
        TargetSolibOps { target, backend }
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }
}

impl<T: LibraryProvider, B: SymfileBackend> SolibOps for TargetSolibOps<T, B> {
    fn current_sos(&mut self) -> Vec<Solib> {
        solib::current_sos(&mut self.target)
    }

    fn relocate_section_addresses(&mut self, so: &mut Solib, sec: &mut TargetSection) {
        relocate::relocate_section_addresses(so, sec)
    }

    fn free_so(&mut self, so: Solib) {
        so.free()
    }

    fn create_inferior_hook(&mut self, _from_tty: bool) {
        // nothing to set up: the target tells us about libraries itself
    }

    fn clear_solib(&mut self) {
        // no per-inferior state to forget
    }

    fn open_symbol_file_object(&mut self, _from_tty: bool) -> bool {
        // the target's report doesn't cover the main executable; the user
        // has to name it
        false
    }

    fn in_dynsym_resolve_code(&mut self, pc: u64) -> bool {
        // there is no dynamic-linker address range to test against, and
        // there may not even be a dynamic linker in the address space; PLT
        // entries (which may be import stubs) are all we can recognize
        self.backend.in_plt_section(pc)
    }

    fn open_object_file(&mut self, name: &str) -> io::Result<Box<dyn ObjectFile>> {
        self.backend.open_object_file(name)
    }
}

/// Selects the process's active library-tracking implementation.
///
/// The embedder owns one of these, installs an implementation during
/// startup, and dispatches all solib operations through it afterwards.
/// Installation is first-come-first-served: a later [`install_if_unset`]
/// leaves an earlier choice in place, matching the convention that
/// target-specific code gets the first word.
///
/// [`install_if_unset`]: SolibRegistry::install_if_unset
#[derive(Default)]
pub struct SolibRegistry {
    active: Option<Box<dyn SolibOps>>,
}

impl SolibRegistry {
    pub fn new() -> Self {
        SolibRegistry { active: None }
    }

    /// Install `ops` as the active implementation, unless one is already
    /// installed. Returns whether `ops` was installed.
    pub fn install_if_unset(&mut self, ops: Box<dyn SolibOps>) -> bool {
        if self.active.is_some() {
            return false;
        }
        self.active = Some(ops);
        true
    }

    pub fn is_set(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_mut(&mut self) -> Option<&mut (dyn SolibOps + 'static)> {
        self.active.as_deref_mut()
    }
}
