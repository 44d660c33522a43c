//! Linkage and registry tests

use super::*;
use crate::compiler::StubCompiler;
use crate::descriptor::{Arch, HostType, NativeType};
use crate::selector::Capabilities;

/// Stand-in for a loaded class
#[allow(dead_code)]
struct Class(&'static str);

fn int_desc(arch: Arch) -> CallDescriptor {
    CallDescriptor::builder(arch)
        .param(NativeType::SInt, HostType::Int)
        .param(NativeType::SInt, HostType::Int)
        .returns(NativeType::SInt, HostType::Int)
        .build()
}

fn quiet() -> StubConfig {
    StubConfig { dump_code: false, ..StubConfig::default() }
}

fn stub(arch: Arch, target: usize) -> Trampoline {
    StubCompiler::for_arch(arch).compile(&int_desc(arch), target, None).expect("compile")
}

#[test]
fn empty_linker_attaches_nothing() {
    let class = Arc::new(Class("empty"));
    let methods = StubLinker::with_config(&quiet()).attach(&class).expect("attach");
    assert!(methods.is_empty());
    assert!(!registry::is_registered(&class));
}

#[test]
fn attach_places_stubs_in_one_arena() {
    let class = Arc::new(Class("pair"));
    let mut linker = StubLinker::with_config(&quiet());
    linker.add("first", "(II)I", stub(Arch::X86_64, 0x1000));
    linker.add("second", "(II)I", stub(Arch::X86_64, 0x2000));
    assert_eq!(linker.len(), 2);

    let methods = linker.attach(&class).expect("attach");
    assert_eq!(methods.len(), 2);
    assert_eq!(methods[0].name, "first");
    assert_ne!(methods[0].address(), methods[1].address());
    assert_eq!(methods[0].address() % STUB_ALIGN, 0);
    assert_eq!(methods[1].address() % STUB_ALIGN, 0);

    assert!(registry::is_registered(&class));
    assert!(!registry::is_empty());
    assert_eq!(registry::arena_count(&class), 1);
    assert!(registry::owns_address(methods[1].address()));
}

#[test]
fn any_sized_class_type_registers() {
    let named = Arc::new(String::from("libc"));
    let mut linker = StubLinker::with_config(&quiet());
    linker.add("m", "(II)I", stub(Arch::X86_64, 0x1000));
    let address = linker.attach(&named).expect("attach")[0].address();
    assert_eq!(registry::arena_count(&named), 1);
    assert!(registry::owns_address(address));

    let numbered = Arc::new(7u64);
    let mut linker = StubLinker::with_config(&quiet());
    linker.add("m", "(II)I", stub(Arch::Aarch64, 0x1000));
    linker.attach(&numbered).expect("attach");
    assert!(registry::is_registered(&numbered));
    assert_ne!(registry::identity(&named), registry::identity(&numbered));
}

#[test]
fn repeated_attach_appends_arenas() {
    let class = Arc::new(Class("twice"));
    for _ in 0..2 {
        let mut linker = StubLinker::with_config(&quiet());
        linker.add("m", "(II)I", stub(Arch::Aarch64, 0x1000));
        linker.attach(&class).expect("attach");
    }
    assert_eq!(registry::arena_count(&class), 2);
}

#[test]
fn dropping_the_class_expunges_its_arenas() {
    let class = Arc::new(Class("transient"));
    let mut linker = StubLinker::with_config(&quiet());
    linker.add("m", "(II)I", stub(Arch::X86_64, 0x1000));
    let address = linker.attach(&class).expect("attach")[0].address();
    assert!(registry::owns_address(address));

    drop(class);
    registry::sweep();
    assert!(!registry::owns_address(address));
}

#[test]
fn dump_logging_does_not_change_entries() {
    let class = Arc::new(Class("dumped"));
    let mut linker = StubLinker::with_config(&StubConfig { dump_code: true, ..StubConfig::default() });
    linker.add("m", "(II)I", stub(Arch::X86_32, 0x1000));
    assert_eq!(linker.attach(&class).expect("attach").len(), 1);
}

#[test]
fn call_site_binds_once() {
    let site = CallSite::new("m", int_desc(Arch::X86_64), 0x1000);
    assert!(!site.is_bound());

    let binding = Binding { strategy: Strategy::GenericBufferPath, entry: Entry::Generic { target: 0x1000, invoker: None } };
    site.bind(binding.clone()).expect("first bind");
    assert!(site.is_bound());
    assert_eq!(site.entry_address(), None);

    let again = site.bind(binding).unwrap_err();
    assert_eq!(again, LinkError::AlreadyBound { name: "m".into() });
}

#[test]
fn link_class_binds_every_site() {
    let class = Arc::new(Class("linked"));
    let selector = StrategySelector::new(Capabilities::full(Arch::X86_64), quiet());
    let composite = CallDescriptor::builder(Arch::X86_64)
        .param(NativeType::String, HostType::Long)
        .returns(NativeType::SInt, HostType::Int)
        .build();
    let sites = [
        CallSite::new("add", int_desc(Arch::X86_64), 0x1000),
        CallSite::new("strlen", composite, 0x2000),
    ];

    link_class(&class, &selector, &sites).expect("link");

    let add = sites[0].binding().expect("bound");
    assert_eq!(add.strategy, Strategy::CompiledTrampoline(Arch::X86_64));
    assert!(registry::owns_address(sites[0].entry_address().expect("compiled")));

    let strlen = sites[1].binding().expect("bound");
    assert_eq!(strlen.strategy, Strategy::GenericBufferPath);
    assert!(matches!(strlen.entry, Entry::Generic { target: 0x2000, invoker: None }));
}

#[test]
fn link_class_skips_bound_sites() {
    let class = Arc::new(Class("prebound"));
    let selector = StrategySelector::new(Capabilities::full(Arch::X86_64), quiet());
    let site = CallSite::new("add", int_desc(Arch::X86_64), 0x1000);
    site.bind(Binding { strategy: Strategy::GenericBufferPath, entry: Entry::Generic { target: 0x1000, invoker: None } })
        .expect("bind");

    link_class(&class, &selector, std::slice::from_ref(&site)).expect("link");
    assert_eq!(site.binding().expect("bound").strategy, Strategy::GenericBufferPath);
    assert!(!registry::is_registered(&class));
}

#[test]
fn link_class_uses_fast_paths_without_compiler() {
    let class = Arc::new(Class("fast"));
    let config = StubConfig { compile_enabled: false, ..quiet() };
    let selector = StrategySelector::new(Capabilities::full(Arch::X86_64), config);
    let site = CallSite::new("add", int_desc(Arch::X86_64), 0x1000);

    link_class(&class, &selector, std::slice::from_ref(&site)).expect("link");
    assert!(matches!(
        site.binding().expect("bound").entry,
        Entry::FastPath { path: FastPath::Int32, target: 0x1000 }
    ));
}

#[cfg(all(target_arch = "x86_64", unix))]
mod native {
    use super::*;

    extern "C" fn sub(a: i32, b: i32) -> i32 {
        a - b
    }

    #[test]
    fn linked_stub_runs_under_hosting_convention() {
        let class = Arc::new(Class("native"));
        let selector = StrategySelector::new(Capabilities::full(Arch::X86_64), quiet());
        let site = CallSite::new("sub", int_desc(Arch::X86_64), sub as *const () as usize);
        link_class(&class, &selector, std::slice::from_ref(&site)).expect("link");

        let entry = site.entry_address().expect("compiled");
        let f: extern "C" fn(usize, usize, i32, i32) -> i32 = unsafe { core::mem::transmute(entry) };
        assert_eq!(f(0xDEAD, 0xBEEF, 10, 3), 7);
    }
}
