//! End-to-end demand-paging scenarios against the public API.

use vmm::{
    Config, EvictionPolicy, OperatingSystem, PageId, PhysicalAddress, Program, Translation,
    VmError,
};

const PAGE_SIZE: usize = 4;
const VIRTUAL_PAGES: usize = 256;

fn resident(os: &OperatingSystem, address: usize) -> PhysicalAddress {
    match os.translate(address) {
        Ok(Translation::Resident(physical)) => physical,
        other => panic!("expected {address:#x} to be resident, got {other:?}"),
    }
}

#[test]
fn fault_then_success() {
    let mut os = OperatingSystem::new(50, PAGE_SIZE, VIRTUAL_PAGES).unwrap();
    let pid = os.start_process(Program::sequential(32)).unwrap();
    let first = os.process(pid).unwrap().next_instruction().unwrap();

    let Ok(Translation::Fault(va)) = os.translate(first) else {
        panic!("a fresh process must fault on its first instruction");
    };
    os.load_page(va.page).unwrap();

    let physical = resident(&os, first);
    assert_eq!(resident(&os, first + 1), physical + 1);
}

#[test]
fn teardown_of_second_process() {
    let mut os = OperatingSystem::new(50, PAGE_SIZE, VIRTUAL_PAGES).unwrap();
    let first = os.start_process(Program::sequential(32)).unwrap();
    let second = os.start_process(Program::sequential(32)).unwrap();
    os.close_process(second).unwrap();

    assert_eq!(os.process_count(), 1);
    assert!(os.process(first).is_some());

    let occupied: Vec<_> = (0..8).map(PageId::new).collect();
    assert_eq!(os.virtual_memory().occupied_list(), occupied.as_slice());

    let free: Vec<_> = (16..VIRTUAL_PAGES).chain(8..16).map(PageId::new).collect();
    assert_eq!(os.virtual_memory().free_list().collect::<Vec<_>>(), free);
    assert!(os.virtual_memory().is_partitioned());
}

#[test]
fn eviction_with_a_single_frame() {
    let mut os = OperatingSystem::new(PAGE_SIZE, PAGE_SIZE, 16).unwrap();
    let a = os.start_process(Program::sequential(PAGE_SIZE)).unwrap();
    let b = os.start_process(Program::sequential(PAGE_SIZE)).unwrap();
    let a_address = os.process(a).unwrap().next_instruction().unwrap();

    let outcome = os.step(a).unwrap();
    assert!(outcome.faulted);
    assert_eq!(outcome.evicted, None);

    let outcome = os.step(b).unwrap();
    assert!(outcome.faulted);
    assert_eq!(outcome.evicted, Some(PageId::new(0)));
    assert_eq!(outcome.physical_address, PhysicalAddress::new(0));

    let evicted = os.page(PageId::new(0)).unwrap();
    assert_eq!(evicted.physical_address(), None);
    assert!(os.page(PageId::new(1)).unwrap().is_resident());
    assert_eq!(os.resident_page_count(), 1);

    assert!(matches!(os.translate(a_address), Ok(Translation::Fault(_))));
}

#[test]
fn released_pages_give_non_contiguous_reservations() {
    let mut os = OperatingSystem::new(16, PAGE_SIZE, 6).unwrap();
    let first = os.start_process(Program::sequential(8)).unwrap();
    os.start_process(Program::sequential(8)).unwrap();
    os.close_process(first).unwrap();

    // Free list is now [4, 5, 0, 1]
    let third = os.start_process(Program::sequential(12)).unwrap();
    let pages = os.process(third).unwrap().pages().to_vec();
    assert_eq!(pages, vec![PageId::new(4), PageId::new(5), PageId::new(0)]);
    assert_eq!(os.process(third).unwrap().next_instruction(), Some(16));
}

#[test]
fn stray_pages_stay_resident_after_close() {
    let mut os = OperatingSystem::new(16, PAGE_SIZE, 8).unwrap();
    let a = os.start_process(Program::sequential(8)).unwrap();
    let b = os.start_process(Program::sequential(8)).unwrap();
    os.close_process(a).unwrap();
    let c = os.start_process(Program::sequential(8)).unwrap();
    os.start_process(Program::sequential(8)).unwrap();
    os.close_process(c).unwrap();

    // Reserves [0, 1, 4] but addresses 0..12 also cover page 2, which belongs to `b`
    let e = os.start_process(Program::sequential(12)).unwrap();
    assert_eq!(
        os.process(e).unwrap().pages(),
        &[PageId::new(0), PageId::new(1), PageId::new(4)]
    );
    os.close_process(b).unwrap();

    while !os.process(e).unwrap().is_drained() {
        os.step(e).unwrap();
    }
    assert!(os.page(PageId::new(2)).unwrap().is_resident());

    os.close_process(e).unwrap();
    assert!(os.page(PageId::new(2)).unwrap().is_resident());
    assert!(os.virtual_memory().free_list().any(|id| id == PageId::new(2)));
    assert_eq!(os.resident_page_count(), 1);
    assert!(os.virtual_memory().is_partitioned());
}

#[test]
fn simulation_is_deterministic() {
    fn run(policy: EvictionPolicy) -> (Vec<bool>, Vec<Option<PhysicalAddress>>) {
        let config = Config::new(12, PAGE_SIZE, 32).with_eviction(policy);
        let mut os = OperatingSystem::with_config(config).unwrap();
        for size in [10, 7, 16] {
            os.start_process(Program::sequential(size)).unwrap();
        }

        while os.processes().iter().any(|process| !process.is_drained()) {
            os.step_all().unwrap();
            for pid in os.finished_processes() {
                os.close_process(pid).unwrap();
            }
        }

        let pages = os
            .virtual_memory()
            .pages()
            .iter()
            .map(|page| page.physical_address())
            .collect();
        (os.occupancy().to_vec(), pages)
    }

    for policy in [EvictionPolicy::FirstResident, EvictionPolicy::Clock] {
        assert_eq!(run(policy), run(policy));
    }
}

#[test]
fn every_process_can_run_to_completion_under_pressure() {
    let config = Config::new(8, PAGE_SIZE, 64).with_eviction(EvictionPolicy::Clock);
    let mut os = OperatingSystem::with_config(config).unwrap();
    let pids: Vec<_> = [20, 9, 33]
        .into_iter()
        .map(|size| os.start_process(Program::sequential(size)).unwrap())
        .collect();

    let mut steps = 0;
    while os.finished_processes().len() < pids.len() {
        steps += os.step_all().unwrap().len();
    }
    assert_eq!(steps, 20 + 9 + 33);
    assert!(os.resident_page_count() <= 2);

    for pid in pids {
        os.close_process(pid).unwrap();
    }
    assert_eq!(os.free_cells(), 8);
    assert_eq!(os.free_region_count(), 1);
    assert_eq!(os.virtual_memory().free_count(), 64);
}

#[test]
fn protocol_violations_surface_as_errors() {
    let mut os = OperatingSystem::new(8, PAGE_SIZE, 4).unwrap();
    os.load_page(PageId::new(2)).unwrap();
    assert_eq!(
        os.load_page(PageId::new(2)),
        Err(VmError::PageAlreadyResident(PageId::new(2)))
    );
    os.unlink_page(PageId::new(2)).unwrap();
    assert_eq!(
        os.unlink_page(PageId::new(2)),
        Err(VmError::PageNotResident(PageId::new(2)))
    );
}
