mod common;

use common::{mounted, MIB};
use sim_fs::{FsError, ROOT_INODE};

#[test]
fn find_entry() {
    let (_disk, mut fs) = mounted(MIB, 512);
    let dir = fs.make_directory("/d").unwrap();

    assert_eq!(fs.find_entry(ROOT_INODE, "d").unwrap().inode_id(), dir);
    assert_eq!(fs.find_entry(dir, ".").unwrap().inode_id(), dir);
    assert_eq!(fs.find_entry(dir, "..").unwrap().inode_id(), ROOT_INODE);
    assert!(matches!(fs.find_entry(dir, "x"), Err(FsError::NotFound)));
    // 空名字永远不会匹配空槽位
    assert!(matches!(fs.find_entry(dir, ""), Err(FsError::NotFound)));
}

#[test]
fn entries_need_a_directory() {
    let (_disk, mut fs) = mounted(MIB, 512);
    let file = fs.ingest("/f", &b"data"[..], 4).unwrap();

    assert!(matches!(fs.find_entry(file, "x"), Err(FsError::NotADirectory)));
    assert!(matches!(fs.add_entry(file, "x", 5), Err(FsError::NotADirectory)));
    assert!(matches!(fs.remove_entry(file, 5), Err(FsError::NotADirectory)));
}

#[test]
fn tombstones_are_reused() {
    let (_disk, mut fs) = mounted(MIB, 512);
    let dir = fs.make_directory("/d").unwrap();
    let ids: Vec<u32> = (0..3).map(|_| fs.alloc_inode().unwrap()).collect();

    fs.add_entry(dir, "a", ids[0]).unwrap();
    fs.add_entry(dir, "b", ids[1]).unwrap();
    fs.remove_entry(dir, ids[0]).unwrap();
    assert!(matches!(fs.find_entry(dir, "a"), Err(FsError::NotFound)));
    assert_eq!(fs.list("/d").unwrap(), [".", "..", "b"]);

    fs.add_entry(dir, "c", ids[2]).unwrap();
    assert_eq!(fs.list("/d").unwrap(), [".", "..", "c", "b"]);
    assert_eq!(fs.find_entry(dir, "c").unwrap().inode_id(), ids[2]);

    // `.` 与 `..` 不会被当作删除目标
    assert!(matches!(fs.remove_entry(dir, dir), Err(FsError::NotFound)));
    assert!(matches!(
        fs.remove_entry(dir, ROOT_INODE),
        Err(FsError::NotFound)
    ));
    assert_eq!(fs.find_entry(dir, "..").unwrap().inode_id(), ROOT_INODE);
}

#[test]
fn add_to_full_directory() {
    // 512 字节一块，16 个槽位
    let (_disk, mut fs) = mounted(MIB, 512);
    let dir = fs.make_directory("/d").unwrap();
    let inode = fs.alloc_inode().unwrap();

    for i in 0..14 {
        fs.add_entry(dir, &format!("e{i}"), inode).unwrap();
    }
    assert!(matches!(
        fs.add_entry(dir, "extra", inode),
        Err(FsError::DirectoryFull)
    ));
    assert_eq!(fs.list("/d").unwrap().len(), 16);

    fs.remove_entry(dir, inode).unwrap();
    assert!(matches!(fs.find_entry(dir, "e0"), Err(FsError::NotFound)));
    fs.add_entry(dir, "extra", inode).unwrap();
    assert_eq!(fs.list("/d").unwrap()[2], "extra");
}

#[test]
fn add_entry_checks_names() {
    let (_disk, mut fs) = mounted(MIB, 512);

    assert!(matches!(
        fs.add_entry(ROOT_INODE, &"n".repeat(28), 1),
        Err(FsError::NameTooLong)
    ));
    assert!(matches!(
        fs.add_entry(ROOT_INODE, "a/b", 1),
        Err(FsError::InvalidName(_))
    ));
    assert_eq!(fs.list("/").unwrap(), [".", ".."]);
}
