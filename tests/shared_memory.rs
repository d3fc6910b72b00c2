// Shared memory backend tests for Linux
// Run with: cargo test --test shared_memory -- --nocapture

mod common;

#[cfg(target_os = "linux")]
mod linux_tests {
    use super::common::TestQueueName;
    use daq_evtstream::Core::{
        attach_shared_memory, create_shared_memory, unlink_shared_memory, RawHandle,
        SharedMemoryBackend,
    };

    #[test]
    fn test_create_shared_memory() {
        let name = TestQueueName::new("shm_create");
        let size = 4096;
        let shm = create_shared_memory(name.as_str(), size).unwrap();

        assert_eq!(shm.size(), size);
        assert!(!shm.as_ptr().is_null());

        // Fresh regions are zero filled
        unsafe {
            let slice = std::slice::from_raw_parts(shm.as_ptr(), size);
            assert!(slice.iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn test_create_twice_fails() {
        let name = TestQueueName::new("shm_excl");
        let _first = create_shared_memory(name.as_str(), 4096).unwrap();
        let err = create_shared_memory(name.as_str(), 4096).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_attach_sees_writes() {
        let name = TestQueueName::new("shm_attach");
        let shm = create_shared_memory(name.as_str(), 8192).unwrap();
        let other = attach_shared_memory(name.as_str()).unwrap();
        assert_eq!(other.size(), 8192);

        unsafe {
            let a = std::slice::from_raw_parts_mut(shm.as_ptr(), 8192);
            for (i, b) in a.iter_mut().take(100).enumerate() {
                *b = (i % 256) as u8;
            }
            let b = std::slice::from_raw_parts(other.as_ptr(), 8192);
            for i in 0..100 {
                assert_eq!(b[i], (i % 256) as u8);
            }
        }
    }

    #[test]
    fn test_raw_handle() {
        let name = TestQueueName::new("shm_handle");
        let shm = create_shared_memory(name.as_str(), 4096).unwrap();
        match shm.raw_handle() {
            RawHandle::Fd(fd) => assert!(fd > 0, "File descriptor should be positive"),
        }
    }

    #[test]
    fn test_attach_missing() {
        let name = TestQueueName::new("shm_missing");
        let err = attach_shared_memory(name.as_str()).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn test_unlink_keeps_mapping() {
        let name = TestQueueName::new("shm_unlink");
        let shm = create_shared_memory(name.as_str(), 4096).unwrap();
        unlink_shared_memory(name.as_str()).unwrap();

        assert!(attach_shared_memory(name.as_str()).is_err());
        unsafe {
            *shm.as_ptr() = 0x42;
            assert_eq!(*shm.as_ptr(), 0x42);
        }
    }

    #[test]
    fn test_bad_names_rejected() {
        for name in ["", "..", "a/b"] {
            let err = create_shared_memory(name, 4096).unwrap_err();
            assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
        }
    }
}
