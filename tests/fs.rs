//! End-to-end behavior of the filesystem façade.

use std::time::SystemTime;

use memvfs::{
    AccessMode, AttrValue, Builder, CopyFlags, MemoryFileSystem, OpenOptions, Permissions,
    Principal, VfsError, ViewSet,
};

fn small_blocks() -> MemoryFileSystem {
    Builder::new().block_size(16).build().unwrap()
}

#[test]
fn create_write_read_round_trip() {
    let fs = small_blocks();
    fs.create_directory(&fs.path("/a").unwrap(), &[]).unwrap();
    let path = fs.path("/a/b.txt").unwrap();

    let out = fs
        .open(&path, OpenOptions::WRITE | OpenOptions::CREATE)
        .unwrap();
    assert_eq!(out.write(b"hello world!").unwrap(), 12);
    out.close();

    let input = fs.input_stream(&path).unwrap();
    let mut buf = [0u8; 32];
    assert_eq!(input.read(&mut buf).unwrap(), 12);
    assert_eq!(&buf[..12], b"hello world!");
    assert_eq!(input.read(&mut buf).unwrap(), 0);
    assert_eq!(input.size().unwrap(), 12);

    let attrs = fs.read_attributes(&path, "basic:*", true).unwrap();
    assert_eq!(attrs["size"], AttrValue::Size(12));
    assert_eq!(attrs["isRegularFile"], AttrValue::Bool(true));
}

#[test]
fn symlink_loop_fails_resolution() {
    let fs = small_blocks();
    let l1 = fs.path("/l1").unwrap();
    let l2 = fs.path("/l2").unwrap();
    fs.create_symlink(&l1, &l2, &[]).unwrap();
    fs.create_symlink(&l2, &l1, &[]).unwrap();

    assert!(matches!(
        fs.read_attributes(&l1, "basic:*", true),
        Err(VfsError::Loop(_))
    ));
    // Without following, the link itself is visible.
    let attrs = fs.read_attributes(&l1, "basic:*", false).unwrap();
    assert_eq!(attrs["isSymbolicLink"], AttrValue::Bool(true));
}

#[test]
fn acyclic_symlink_chain_resolves() {
    let fs = small_blocks();
    fs.create_directory(&fs.path("/a").unwrap(), &[]).unwrap();
    fs.create_file(&fs.path("/a/target").unwrap(), &[]).unwrap();
    fs.create_symlink(
        &fs.path("/one").unwrap(),
        &fs.path("/two").unwrap(),
        &[],
    )
    .unwrap();
    fs.create_symlink(
        &fs.path("/two").unwrap(),
        &fs.path("/a/target").unwrap(),
        &[],
    )
    .unwrap();

    let real = fs.real_path(&fs.path("/one").unwrap(), true).unwrap();
    assert_eq!(real.to_string(), "/a/target");
}

#[test]
fn relative_symlink_resolves_against_parent() {
    let fs = small_blocks();
    fs.create_directory(&fs.path("/a").unwrap(), &[]).unwrap();
    fs.create_file(&fs.path("/a/b").unwrap(), &[]).unwrap();
    // A target with no root resolves against the link's directory.
    let link = fs.path("/a/link").unwrap();
    let target = fs.relative_path("b").unwrap();
    fs.create_symlink(&link, &target, &[]).unwrap();
    assert!(fs.exists(&link, true).unwrap());
    assert_eq!(fs.real_path(&link, true).unwrap().to_string(), "/a/b");

    // And `..` in a relative target climbs out of the directory.
    fs.create_file(&fs.path("/top").unwrap(), &[]).unwrap();
    let upward = fs.path("/a/up").unwrap();
    fs.create_symlink(&upward, &fs.relative_path("../top").unwrap(), &[])
        .unwrap();
    assert_eq!(fs.real_path(&upward, true).unwrap().to_string(), "/top");
}

#[test]
fn move_with_replace_existing() {
    let fs = small_blocks();
    let a = fs.path("/a").unwrap();
    let b = fs.path("/b").unwrap();
    fs.create_directory(&a, &[]).unwrap();
    fs.create_file(&fs.path("/a/x").unwrap(), &[]).unwrap();
    fs.create_directory(&b, &[]).unwrap();

    fs.move_to(&a, &b, CopyFlags::REPLACE_EXISTING).unwrap();
    assert!(fs.exists(&fs.path("/b/x").unwrap(), true).unwrap());
    assert!(!fs.exists(&a, true).unwrap());

    // Move onto an existing entry without REPLACE_EXISTING fails.
    fs.create_directory(&a, &[]).unwrap();
    assert!(matches!(
        fs.move_to(&a, &b, CopyFlags::empty()),
        Err(VfsError::AlreadyExists(_))
    ));

    // Replacing a non-empty directory fails even with the flag.
    assert!(matches!(
        fs.move_to(&a, &b, CopyFlags::REPLACE_EXISTING),
        Err(VfsError::DirectoryNotEmpty(_))
    ));
}

#[test]
fn delete_while_open_is_busy() {
    let fs = small_blocks();
    let path = fs.path("/f").unwrap();
    let channel = fs
        .open(&path, OpenOptions::WRITE | OpenOptions::CREATE)
        .unwrap();
    assert!(matches!(fs.delete(&path), Err(VfsError::Busy(_))));
    channel.close();
    fs.delete(&path).unwrap();
    assert!(!fs.exists(&path, true).unwrap());
}

#[test]
fn case_insensitive_lookup_preserves_display_case() {
    let fs = Builder::new().case_insensitive().build().unwrap();
    fs.create_directory(&fs.path("/Foo").unwrap(), &[]).unwrap();

    assert!(fs.exists(&fs.path("/FOO").unwrap(), true).unwrap());
    assert!(fs.exists(&fs.path("/foo").unwrap(), true).unwrap());

    let names: Vec<String> = fs
        .read_dir(&fs.path("/").unwrap())
        .unwrap()
        .map(|p| p.file_name().unwrap().to_owned())
        .collect();
    assert_eq!(names, ["Foo"]);

    // Same entry through either case.
    let real = fs.real_path(&fs.path("/FOO").unwrap(), true).unwrap();
    assert_eq!(real.to_string(), "/Foo");
}

#[test]
fn create_twice_fails_already_exists() {
    let fs = small_blocks();
    let path = fs.path("/dir").unwrap();
    fs.create_directory(&path, &[]).unwrap();
    assert!(matches!(
        fs.create_directory(&path, &[]),
        Err(VfsError::AlreadyExists(_))
    ));
    assert!(matches!(
        fs.create_file(&path, &[]),
        Err(VfsError::AlreadyExists(_))
    ));
}

#[test]
fn delete_twice_fails_not_found() {
    let fs = small_blocks();
    let path = fs.path("/f").unwrap();
    fs.create_file(&path, &[]).unwrap();
    fs.delete(&path).unwrap();
    assert!(matches!(fs.delete(&path), Err(VfsError::NotFound(_))));
}

#[test]
fn move_preserves_content_bit_for_bit() {
    let fs = small_blocks();
    let src = fs.path("/src.bin").unwrap();
    let dst = fs.path("/dst.bin").unwrap();
    let payload: Vec<u8> = (0..100u8).collect();
    let out = fs.output_stream(&src).unwrap();
    out.write(&payload).unwrap();
    out.close();

    fs.move_to(&src, &dst, CopyFlags::empty()).unwrap();
    assert!(!fs.exists(&src, true).unwrap());

    let input = fs.input_stream(&dst).unwrap();
    let mut buf = vec![0u8; 200];
    let read = input.read(&mut buf).unwrap();
    assert_eq!(&buf[..read], &payload[..]);
}

#[test]
fn copy_leaves_source_intact() {
    let fs = small_blocks();
    let src = fs.path("/src").unwrap();
    let dst = fs.path("/dst").unwrap();
    let out = fs.output_stream(&src).unwrap();
    out.write(b"payload").unwrap();
    out.close();

    fs.copy(&src, &dst, CopyFlags::empty()).unwrap();

    for path in [&src, &dst] {
        let input = fs.input_stream(path).unwrap();
        let mut buf = [0u8; 16];
        let read = input.read(&mut buf).unwrap();
        assert_eq!(&buf[..read], b"payload");
    }
}

#[test]
fn real_path_is_idempotent() {
    let fs = small_blocks();
    fs.create_directory(&fs.path("/a").unwrap(), &[]).unwrap();
    fs.create_file(&fs.path("/a/f").unwrap(), &[]).unwrap();
    fs.create_symlink(&fs.path("/link").unwrap(), &fs.path("/a").unwrap(), &[])
        .unwrap();

    let once = fs.real_path(&fs.path("/link/f").unwrap(), true).unwrap();
    let twice = fs.real_path(&once, true).unwrap();
    assert_eq!(once, twice);
    assert_eq!(once.to_string(), "/a/f");
}

#[test]
fn empty_root_and_trailing_separator_paths() {
    let fs = small_blocks();
    assert_eq!(fs.path("").unwrap().to_string(), "/");
    assert_eq!(fs.path("/").unwrap().to_string(), "/");
    assert_eq!(fs.path("///").unwrap().to_string(), "/");
    assert!(fs.exists(&fs.path("").unwrap(), true).unwrap());
    fs.create_directory(&fs.path("/d").unwrap(), &[]).unwrap();
    assert_eq!(fs.path("/d/").unwrap().to_string(), "/d");
}

#[test]
fn write_at_size_grows_and_read_at_size_hits_eof() {
    let fs = small_blocks();
    let path = fs.path("/f").unwrap();
    let channel = fs
        .open(&path, OpenOptions::READ | OpenOptions::WRITE | OpenOptions::CREATE)
        .unwrap();
    channel.write(b"abc").unwrap();

    channel.set_position(3).unwrap();
    let mut buf = [0u8; 4];
    assert_eq!(channel.read(&mut buf).unwrap(), 0);

    channel.set_position(3).unwrap();
    channel.write(b"def").unwrap();
    assert_eq!(channel.size().unwrap(), 6);

    // Writing past the end zero-fills the gap.
    channel.set_position(10).unwrap();
    channel.write(b"x").unwrap();
    assert_eq!(channel.size().unwrap(), 11);
    channel.set_position(6).unwrap();
    assert_eq!(channel.read(&mut buf).unwrap(), 4);
    assert_eq!(&buf, b"\0\0\0\0");
}

#[test]
fn set_times_rejects_missing_arguments() {
    let fs = small_blocks();
    let path = fs.path("/f").unwrap();
    fs.create_file(&path, &[]).unwrap();
    let now = SystemTime::now();
    assert!(matches!(
        fs.set_times(&path, Some(now), Some(now), None),
        Err(VfsError::InvalidArgument(_))
    ));
    fs.set_times(&path, Some(now), Some(now), Some(now)).unwrap();
    let attrs = fs.read_attributes(&path, "basic:*", true).unwrap();
    assert_eq!(attrs["creationTime"], AttrValue::Time(now));
}

#[test]
fn read_only_filesystem_rejects_mutations() {
    let fs = Builder::new().read_only(true).build().unwrap();
    let path = fs.path("/f").unwrap();
    assert!(matches!(
        fs.create_file(&path, &[]),
        Err(VfsError::ReadOnly)
    ));
    assert!(matches!(fs.delete(&path), Err(VfsError::ReadOnly)));
    assert!(matches!(
        fs.open(&path, OpenOptions::WRITE | OpenOptions::CREATE),
        Err(VfsError::ReadOnly)
    ));
    assert!(matches!(
        fs.check_access(&fs.path("/").unwrap(), &[AccessMode::Write]),
        Err(VfsError::ReadOnly)
    ));
    // Reading still works.
    fs.check_access(&fs.path("/").unwrap(), &[AccessMode::Read])
        .unwrap();
}

#[test]
fn closed_filesystem_rejects_everything_but_close() {
    let fs = small_blocks();
    let path = fs.path("/f").unwrap();
    fs.create_file(&path, &[]).unwrap();
    let channel = fs.input_stream(&path).unwrap();

    assert!(fs.is_open());
    fs.close();
    fs.close();
    assert!(!fs.is_open());

    assert!(matches!(fs.path("/x"), Err(VfsError::Closed)));
    assert!(matches!(fs.exists(&path, true), Err(VfsError::Closed)));
    assert!(matches!(fs.delete(&path), Err(VfsError::Closed)));
    let mut buf = [0u8; 4];
    assert!(matches!(channel.read(&mut buf), Err(VfsError::Closed)));
}

#[test]
fn append_forces_end_of_file_and_forbids_seeking() {
    let fs = small_blocks();
    let path = fs.path("/log").unwrap();
    let out = fs.output_stream(&path).unwrap();
    out.write(b"one").unwrap();
    out.close();

    let appender = fs
        .open(&path, OpenOptions::APPEND | OpenOptions::CREATE)
        .unwrap();
    appender.write(b"two").unwrap();
    assert!(matches!(
        appender.set_position(0),
        Err(VfsError::InvalidArgument(_))
    ));
    appender.close();

    let input = fs.input_stream(&path).unwrap();
    let mut buf = [0u8; 16];
    let read = input.read(&mut buf).unwrap();
    assert_eq!(&buf[..read], b"onetwo");
}

#[test]
fn create_new_fails_on_existing_file() {
    let fs = small_blocks();
    let path = fs.path("/f").unwrap();
    fs.create_file(&path, &[]).unwrap();
    assert!(matches!(
        fs.open(&path, OpenOptions::WRITE | OpenOptions::CREATE_NEW),
        Err(VfsError::AlreadyExists(_))
    ));
}

#[test]
fn truncate_existing_resets_content() {
    let fs = small_blocks();
    let path = fs.path("/f").unwrap();
    let out = fs.output_stream(&path).unwrap();
    out.write(b"0123456789").unwrap();
    out.close();

    let out = fs.output_stream(&path).unwrap();
    assert_eq!(out.size().unwrap(), 0);
    out.write(b"ab").unwrap();
    out.close();

    let input = fs.input_stream(&path).unwrap();
    let mut buf = [0u8; 16];
    let read = input.read(&mut buf).unwrap();
    assert_eq!(&buf[..read], b"ab");
}

#[test]
fn delete_on_close_removes_the_file() {
    let fs = small_blocks();
    let path = fs.path("/tmp.txt").unwrap();
    let channel = fs
        .open(
            &path,
            OpenOptions::WRITE | OpenOptions::CREATE | OpenOptions::DELETE_ON_CLOSE,
        )
        .unwrap();
    channel.write(b"scratch").unwrap();
    assert!(fs.exists(&path, true).unwrap());
    channel.close();
    assert!(!fs.exists(&path, true).unwrap());
}

#[test]
fn directory_stream_is_a_snapshot_in_insertion_order() {
    let fs = small_blocks();
    let dir = fs.path("/d").unwrap();
    fs.create_directory(&dir, &[]).unwrap();
    for name in ["zeta", "alpha", "mid"] {
        fs.create_file(&fs.path(&format!("/d/{name}")).unwrap(), &[])
            .unwrap();
    }
    let stream = fs.read_dir(&dir).unwrap();
    // Mutations after the snapshot are not reflected.
    fs.create_file(&fs.path("/d/late").unwrap(), &[]).unwrap();
    let names: Vec<String> = stream.map(|p| p.file_name().unwrap().to_owned()).collect();
    assert_eq!(names, ["zeta", "alpha", "mid"]);
}

#[test]
fn directory_stream_filter_and_matcher() {
    let fs = small_blocks();
    let dir = fs.path("/src").unwrap();
    fs.create_directory(&dir, &[]).unwrap();
    for name in ["lib.rs", "main.rs", "notes.md"] {
        fs.create_file(&fs.path(&format!("/src/{name}")).unwrap(), &[])
            .unwrap();
    }
    let matcher = fs.path_matcher("glob:/src/*.rs").unwrap();
    let names: Vec<String> = fs
        .read_dir_filtered(&dir, move |p| matcher.matches(p))
        .unwrap()
        .map(|p| p.file_name().unwrap().to_owned())
        .collect();
    assert_eq!(names, ["lib.rs", "main.rs"]);
}

#[test]
fn matcher_expression_validation() {
    let fs = small_blocks();
    assert!(matches!(
        fs.path_matcher("*.rs"),
        Err(VfsError::InvalidArgument(_))
    ));
    assert!(matches!(
        fs.path_matcher(":*.rs"),
        Err(VfsError::InvalidArgument(_))
    ));
    assert!(matches!(
        fs.path_matcher("fancy:*.rs"),
        Err(VfsError::NotSupported(_))
    ));
    fs.path_matcher("regex:.*\\.rs").unwrap();
}

#[test]
fn posix_attributes_on_linux_preset() {
    let fs = Builder::linux().build().unwrap();
    let path = fs.path("/f").unwrap();
    fs.create_file(&path, &[]).unwrap();

    let posix = fs.read_posix_attributes(&path, true).unwrap();
    // umask 022 knocks group/other write off the 0666 default.
    assert_eq!(posix.permissions(), Permissions::from_mode(0o644));

    let view = fs.posix_view(&path, true).unwrap();
    view.set_permissions(Permissions::from_mode(0o600)).unwrap();
    view.set_group(Principal::named("wheel")).unwrap();
    let posix = view.read().unwrap();
    assert_eq!(posix.permissions(), Permissions::from_mode(0o600));
    assert_eq!(posix.group().name(), "wheel");

    let owner = fs.owner(&path, true).unwrap();
    assert_eq!(owner.name(), "user");
}

#[test]
fn initial_posix_permissions_at_creation() {
    let fs = Builder::linux().build().unwrap();
    let path = fs.path("/f").unwrap();
    fs.create_file(
        &path,
        &[(
            "posix:permissions",
            AttrValue::Permissions(Permissions::from_mode(0o400)),
        )],
    )
    .unwrap();
    let posix = fs.read_posix_attributes(&path, true).unwrap();
    assert_eq!(posix.permissions(), Permissions::from_mode(0o400));

    // Time attributes cannot be set at creation.
    assert!(matches!(
        fs.create_file(
            &fs.path("/g").unwrap(),
            &[("creationTime", AttrValue::Time(SystemTime::now()))],
        ),
        Err(VfsError::NotSupported(_))
    ));
}

#[test]
fn dos_attributes_on_windows_preset() {
    let fs = Builder::windows().build().unwrap();
    assert_eq!(fs.separator(), "\\");
    let path = fs.path("C:\\file.txt").unwrap();
    fs.create_file(&path, &[]).unwrap();

    let view = fs.dos_view(&path, true).unwrap();
    view.set_hidden(true).unwrap();
    view.set_read_only(true).unwrap();
    let dos = view.read().unwrap();
    assert!(dos.is_hidden());
    assert!(dos.is_read_only());
    assert!(!dos.is_system());

    // Lookup is case-insensitive.
    assert!(fs.exists(&fs.path("c:\\FILE.TXT").unwrap(), true).unwrap());
}

#[test]
fn unconfigured_views_are_rejected() {
    let fs = small_blocks();
    let path = fs.path("/f").unwrap();
    fs.create_file(&path, &[]).unwrap();
    assert!(matches!(fs.dos_view(&path, true), Err(VfsError::NotSupported(_))));
    assert!(matches!(
        fs.read_attributes(&path, "posix:*", true),
        Err(VfsError::NotSupported(_))
    ));
    assert!(matches!(fs.user_view(&path), Err(VfsError::NotSupported(_))));
}

#[test]
fn user_defined_attributes() {
    let fs = Builder::new().views(ViewSet::USER).build().unwrap();
    let path = fs.path("/f").unwrap();
    fs.create_file(&path, &[]).unwrap();
    let view = fs.user_view(&path).unwrap();

    view.write("mime", b"text/plain").unwrap();
    assert_eq!(view.list().unwrap(), ["mime"]);
    assert_eq!(view.size("mime").unwrap(), 10);

    let mut buf = [0u8; 16];
    assert_eq!(view.read("mime", &mut buf).unwrap(), 10);
    assert_eq!(&buf[..10], b"text/plain");

    let mut tiny = [0u8; 4];
    assert!(matches!(
        view.read("mime", &mut tiny),
        Err(VfsError::InvalidArgument(_))
    ));

    view.delete("mime").unwrap();
    assert!(view.list().unwrap().is_empty());
    assert!(matches!(
        view.size("mime"),
        Err(VfsError::InvalidArgument(_))
    ));
}

#[test]
fn read_symlink_returns_stored_target() {
    let fs = small_blocks();
    let link = fs.path("/link").unwrap();
    let target = fs.path("/some/where").unwrap();
    fs.create_symlink(&link, &target, &[]).unwrap();
    assert_eq!(fs.read_symlink(&link).unwrap(), target);

    let file = fs.path("/f").unwrap();
    fs.create_file(&file, &[]).unwrap();
    assert!(matches!(
        fs.read_symlink(&file),
        Err(VfsError::InvalidArgument(_))
    ));
}

#[test]
fn move_takes_the_symlink_itself() {
    let fs = small_blocks();
    fs.create_file(&fs.path("/target").unwrap(), &[]).unwrap();
    let link = fs.path("/link").unwrap();
    fs.create_symlink(&link, &fs.path("/target").unwrap(), &[])
        .unwrap();

    fs.move_to(&link, &fs.path("/moved").unwrap(), CopyFlags::empty())
        .unwrap();
    let attrs = fs
        .read_attributes(&fs.path("/moved").unwrap(), "basic:*", false)
        .unwrap();
    assert_eq!(attrs["isSymbolicLink"], AttrValue::Bool(true));
    assert!(fs.exists(&fs.path("/target").unwrap(), true).unwrap());
}

#[test]
fn copy_follows_symlinks_unless_told_otherwise() {
    let fs = small_blocks();
    let target = fs.path("/target").unwrap();
    let out = fs.output_stream(&target).unwrap();
    out.write(b"data").unwrap();
    out.close();
    let link = fs.path("/link").unwrap();
    fs.create_symlink(&link, &target, &[]).unwrap();

    fs.copy(&link, &fs.path("/as-file").unwrap(), CopyFlags::empty())
        .unwrap();
    let attrs = fs
        .read_attributes(&fs.path("/as-file").unwrap(), "basic:*", false)
        .unwrap();
    assert_eq!(attrs["isRegularFile"], AttrValue::Bool(true));
    assert_eq!(attrs["size"], AttrValue::Size(4));

    fs.copy(
        &link,
        &fs.path("/as-link").unwrap(),
        CopyFlags::NOFOLLOW_LINKS,
    )
    .unwrap();
    let attrs = fs
        .read_attributes(&fs.path("/as-link").unwrap(), "basic:*", false)
        .unwrap();
    assert_eq!(attrs["isSymbolicLink"], AttrValue::Bool(true));
}

#[test]
fn copy_attributes_flag_carries_metadata() {
    let fs = Builder::linux().build().unwrap();
    let src = fs.path("/src").unwrap();
    fs.create_file(&src, &[]).unwrap();
    let stamp = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_000_000);
    fs.set_times(&src, Some(stamp), Some(stamp), Some(stamp))
        .unwrap();
    let view = fs.posix_view(&src, true).unwrap();
    view.set_permissions(Permissions::from_mode(0o640)).unwrap();

    fs.copy(&src, &fs.path("/with").unwrap(), CopyFlags::COPY_ATTRIBUTES)
        .unwrap();
    let attrs = fs
        .read_attributes(&fs.path("/with").unwrap(), "basic:creationTime", true)
        .unwrap();
    assert_eq!(attrs["creationTime"], AttrValue::Time(stamp));
    let posix = fs
        .read_posix_attributes(&fs.path("/with").unwrap(), true)
        .unwrap();
    assert_eq!(posix.permissions(), Permissions::from_mode(0o640));

    fs.copy(&src, &fs.path("/without").unwrap(), CopyFlags::empty())
        .unwrap();
    let attrs = fs
        .read_attributes(&fs.path("/without").unwrap(), "basic:creationTime", true)
        .unwrap();
    assert_ne!(attrs["creationTime"], AttrValue::Time(stamp));
}

#[test]
fn copy_of_directory_is_shallow() {
    let fs = small_blocks();
    fs.create_directory(&fs.path("/d").unwrap(), &[]).unwrap();
    fs.create_file(&fs.path("/d/child").unwrap(), &[]).unwrap();
    fs.copy(
        &fs.path("/d").unwrap(),
        &fs.path("/copy").unwrap(),
        CopyFlags::empty(),
    )
    .unwrap();
    assert!(fs.exists(&fs.path("/copy").unwrap(), true).unwrap());
    assert!(!fs.exists(&fs.path("/copy/child").unwrap(), true).unwrap());
    assert_eq!(fs.read_dir(&fs.path("/copy").unwrap()).unwrap().count(), 0);
}

#[test]
fn move_into_own_subtree_is_rejected() {
    let fs = small_blocks();
    fs.create_directory(&fs.path("/a").unwrap(), &[]).unwrap();
    fs.create_directory(&fs.path("/a/b").unwrap(), &[]).unwrap();
    assert!(matches!(
        fs.move_to(
            &fs.path("/a").unwrap(),
            &fs.path("/a/b/c").unwrap(),
            CopyFlags::empty(),
        ),
        Err(VfsError::InvalidArgument(_))
    ));
}

#[test]
fn move_to_itself_is_a_no_op() {
    let fs = small_blocks();
    let path = fs.path("/f").unwrap();
    let out = fs.output_stream(&path).unwrap();
    out.write(b"keep").unwrap();
    out.close();
    fs.move_to(&path, &path, CopyFlags::empty()).unwrap();
    let input = fs.input_stream(&path).unwrap();
    let mut buf = [0u8; 8];
    let read = input.read(&mut buf).unwrap();
    assert_eq!(&buf[..read], b"keep");
}

#[test]
fn cross_instance_copy_and_move() {
    let src_fs = Builder::new().name("left").block_size(8).build().unwrap();
    let dst_fs = Builder::new().name("right").block_size(32).build().unwrap();

    let src = src_fs.path("/data").unwrap();
    let out = src_fs.output_stream(&src).unwrap();
    out.write(b"travels between stores").unwrap();
    out.close();

    let dst = dst_fs.path("/landed").unwrap();
    MemoryFileSystem::copy_between(&src_fs, &src, &dst_fs, &dst, CopyFlags::empty()).unwrap();
    let input = dst_fs.input_stream(&dst).unwrap();
    let mut buf = [0u8; 64];
    let read = input.read(&mut buf).unwrap();
    assert_eq!(&buf[..read], b"travels between stores");
    assert!(src_fs.exists(&src, true).unwrap());

    let moved = dst_fs.path("/moved").unwrap();
    MemoryFileSystem::move_between(&src_fs, &src, &dst_fs, &moved, CopyFlags::empty()).unwrap();
    assert!(!src_fs.exists(&src, true).unwrap());
    assert!(dst_fs.exists(&moved, true).unwrap());

    // A populated directory cannot change stores.
    src_fs
        .create_directory(&src_fs.path("/dir").unwrap(), &[])
        .unwrap();
    src_fs
        .create_file(&src_fs.path("/dir/child").unwrap(), &[])
        .unwrap();
    assert!(matches!(
        MemoryFileSystem::move_between(
            &src_fs,
            &src_fs.path("/dir").unwrap(),
            &dst_fs,
            &dst_fs.path("/dir").unwrap(),
            CopyFlags::empty(),
        ),
        Err(VfsError::DirectoryNotEmpty(_))
    ));
}

#[test]
fn store_ceiling_limits_allocation() {
    let fs = Builder::new()
        .block_size(16)
        .max_size(64)
        .build()
        .unwrap();
    let path = fs.path("/big").unwrap();
    let out = fs.output_stream(&path).unwrap();
    out.write(&[7u8; 64]).unwrap();
    assert!(matches!(out.write(b"x"), Err(VfsError::Io(_))));
    out.close();

    let info = fs.store_info();
    assert_eq!(info.block_size, 16);
    assert_eq!(info.allocated_bytes, 64);
    assert_eq!(info.max_bytes, Some(64));

    fs.delete(&path).unwrap();
    assert_eq!(fs.store_info().allocated_bytes, 0);
}

#[test]
fn check_access_and_exists() {
    let fs = small_blocks();
    let path = fs.path("/f").unwrap();
    assert!(matches!(
        fs.check_access(&path, &[AccessMode::Read]),
        Err(VfsError::NotFound(_))
    ));
    assert!(!fs.exists(&path, true).unwrap());
    fs.create_file(&path, &[]).unwrap();
    fs.check_access(
        &path,
        &[AccessMode::Read, AccessMode::Write, AccessMode::Execute],
    )
    .unwrap();
    assert!(fs.exists(&path, true).unwrap());
}

#[test]
fn intermediate_non_directory_fails() {
    let fs = small_blocks();
    fs.create_file(&fs.path("/f").unwrap(), &[]).unwrap();
    assert!(matches!(
        fs.exists(&fs.path("/f/child").unwrap(), true),
        Ok(false)
    ));
    assert!(matches!(
        fs.create_file(&fs.path("/f/child").unwrap(), &[]),
        Err(VfsError::NotADirectory(_))
    ));
}

#[test]
fn multiple_roots() {
    let fs = Builder::new()
        .separator("\\")
        .roots(["C:\\", "D:\\"])
        .build()
        .unwrap();
    let roots: Vec<String> = fs.roots().iter().map(|r| r.to_string()).collect();
    assert_eq!(roots, ["C:\\", "D:\\"]);

    fs.create_file(&fs.path("C:\\f").unwrap(), &[]).unwrap();
    fs.create_file(&fs.path("D:\\f").unwrap(), &[]).unwrap();
    assert!(fs.exists(&fs.path("C:\\f").unwrap(), true).unwrap());
    assert!(fs.exists(&fs.path("D:\\f").unwrap(), true).unwrap());
    assert!(!fs.exists(&fs.path("D:\\missing").unwrap(), true).unwrap());
}

#[test]
fn relative_paths_resolve_against_cwd() {
    let fs = Builder::new()
        .current_working_directory("/work")
        .build()
        .unwrap();
    fs.create_directory(&fs.path("/work").unwrap(), &[]).unwrap();
    assert_eq!(fs.path("notes.txt").unwrap().to_string(), "/work/notes.txt");
    assert_eq!(fs.path("../top").unwrap().to_string(), "/top");
    fs.create_file(&fs.path("notes.txt").unwrap(), &[]).unwrap();
    assert!(fs.exists(&fs.path("/work/notes.txt").unwrap(), true).unwrap());
}
