// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Integration tests for q-hal
//!
//! Exercises the region model and the simulated unit on the host. Register
//! drivers cannot run here; they share the same trait contract.

mod region_tests {
    use q_hal::{
        AccessPermission, Execute, HalError, MemoryAttribute, RawRegion, RegionAttributes,
        RegionDescriptor, SecurityAttribute, Shareability,
    };

    #[test]
    fn test_every_constructed_region_is_ordered_and_aligned() {
        let attrs = RegionAttributes::DATA_RW_PRIV;
        for (base, limit) in [
            (0x0000_0000, 0x0000_001F),
            (0x2000_0000, 0x2003_FFFF),
            (0x0C00_0000, 0x0C1F_FFFF),
            (0xFFFF_FFE0, 0xFFFF_FFFF),
        ] {
            let r = RegionDescriptor::new(0, base, limit, attrs).expect("valid region");
            assert!(r.base() < r.limit());
            assert_eq!(r.base() % 32, 0);
            assert_eq!((r.limit() + 1) % 32, 0);
        }
    }

    #[test]
    fn test_invalid_construction_rejected() {
        let attrs = RegionAttributes::CODE_RO_ALL;
        assert_eq!(
            RegionDescriptor::new(0, 0x100, 0x0FF, attrs),
            Err(HalError::InvalidRange)
        );
        assert_eq!(
            RegionDescriptor::new(0, 0x110, 0x1FF, attrs),
            Err(HalError::Misaligned)
        );
    }

    #[test]
    fn test_raw_decode_rejects_out_of_set_values() {
        for rbar_low in 0..32u32 {
            let raw = RawRegion {
                index: 0,
                rbar: 0x2000_0000 | rbar_low,
                rlar: 0x2000_0FE0 | RawRegion::RLAR_ENABLE,
                rsar: 0,
            };
            let shareability = (rbar_low >> 3) & 0x3;
            match raw.decode() {
                Ok(r) => {
                    assert_ne!(shareability, 1, "reserved shareability must not decode");
                    let a = r.attributes();
                    assert_eq!(a.memory, MemoryAttribute::Code);
                    assert!(matches!(a.execute, Execute::Allow | Execute::Never));
                }
                Err(e) => {
                    assert_eq!(shareability, 1);
                    assert_eq!(e, HalError::InvalidEncoding);
                }
            }
        }
    }

    #[test]
    fn test_attribute_constructors() {
        let a = RegionAttributes::block(SecurityAttribute::NonSecure, false);
        assert_eq!(a.access, AccessPermission::RwAll);
        assert_eq!(a.execute, Execute::Never);
        let a = RegionAttributes::attribution(SecurityAttribute::NonSecureCallable);
        assert_eq!(a.shareability, Shareability::None);
        assert_eq!(a.security, SecurityAttribute::NonSecureCallable);
    }

    #[test]
    fn test_overlap_detection() {
        let a = RegionDescriptor::new(0, 0x2000_0000, 0x2000_0FFF, RegionAttributes::DATA_RW_ALL).unwrap();
        let b = RegionDescriptor::new(1, 0x2000_0FE0, 0x2000_1FFF, RegionAttributes::DATA_RW_ALL).unwrap();
        let c = RegionDescriptor::new(2, 0x2000_1000, 0x2000_1FFF, RegionAttributes::DATA_RW_ALL).unwrap();
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }
}

mod sim_tests {
    use q_hal::sim::SimRegionTable;
    use q_hal::{HalError, HardwareRegionTable, RegionAttributes, RegionDescriptor, Unit};

    #[test]
    fn test_clear_all_empties_table() {
        let mut table: SimRegionTable<8> = SimRegionTable::new(Unit::Mpu);
        for i in 0..4 {
            let base = 0x2000_0000 + u32::from(i) * 0x1000;
            let r = RegionDescriptor::new(i, base, base + 0xFFF, RegionAttributes::DATA_RW_ALL).unwrap();
            table.set_region(&r).unwrap();
        }
        table.clear_all().unwrap();
        for i in 0..8 {
            assert_eq!(table.get_region(i).unwrap(), None);
        }
    }

    #[test]
    fn test_locked_table_rejects_clear_all() {
        let mut table: SimRegionTable<2> = SimRegionTable::new(Unit::Sau);
        table.lock().unwrap();
        assert_eq!(table.clear_all(), Err(HalError::Locked));
        assert_eq!(table.unit(), Unit::Sau);
        assert_eq!(table.capacity(), 2);
    }
}
