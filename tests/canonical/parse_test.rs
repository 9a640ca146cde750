//! Tests for parsing captured tool output into canonical records.

use killer::canonical::{cdrom_drive_names, connected_flag, paired_devices, usb_ids};

const BT_DEVICE_LIST: &str = "\
Added devices:
Generic Bluetooth Device (de:af:be:ef:ca:fe)
MX Anywhere 2S (00:1A:7D:DA:71:13)
";

const BT_DEVICE_INFO: &str = "\
[DE:AF:BE:EF:CA:FE]
  Name: Generic Bluetooth Device
  Alias: Generic Bluetooth Device [rw]
  Address: DE:AF:BE:EF:CA:FE
  Icon: audio-card
  Class: 0x240404
  Paired: 1
  Trusted: 1 [rw]
  Blocked: 0 [rw]
  Connected: 1
  UUIDs: [AudioSink, AVRemoteControl]
";

const LSUSB: &str = "\
Bus 002 Device 001: ID 1d6b:0003 Linux Foundation 3.0 root hub
Bus 001 Device 004: ID 05AC:12A8 Apple, Inc. iPhone 5/5C/5S/6/SE
Bus 001 Device 003: ID 046d:c52b Logitech, Inc. Unifying Receiver
Bus 001 Device 001: ID 1d6b:0002 Linux Foundation 2.0 root hub
";

const CDROM_INFO: &str = "\
CD-ROM information, Id: cdrom.c 3.20 2003/12/17

drive name:\t\tsr1\tsr0
drive speed:\t\t24\t24
drive # of slots:\t1\t1
Can close tray:\t\t1\t1
";

#[test]
fn paired_listing_keeps_names_with_addresses() {
    let devices = paired_devices(BT_DEVICE_LIST);
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].address, "DE:AF:BE:EF:CA:FE");
    assert_eq!(devices[0].name, "Generic Bluetooth Device");
    assert_eq!(devices[1].address, "00:1A:7D:DA:71:13");
    assert_eq!(devices[1].name, "MX Anywhere 2S");
}

#[test]
fn paired_listing_handles_parentheses_in_names() {
    let devices = paired_devices("Keyboard (Office) (AA:BB:CC:DD:EE:01)\n");
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].name, "Keyboard (Office)");
    assert_eq!(devices[0].address, "AA:BB:CC:DD:EE:01");
}

#[test]
fn paired_listing_without_devices_is_empty() {
    assert!(paired_devices("Added devices:\n").is_empty());
    assert!(paired_devices("").is_empty());
}

#[test]
fn connection_flag_is_read_from_info_output() {
    assert_eq!(connected_flag(BT_DEVICE_INFO), Some(true));
    let disconnected = BT_DEVICE_INFO.replace("Connected: 1", "Connected: 0");
    assert_eq!(connected_flag(&disconnected), Some(false));
}

#[test]
fn info_output_without_connection_row_is_rejected() {
    assert_eq!(connected_flag("  Name: headset\n  Paired: 1\n"), None);
}

#[test]
fn lsusb_ids_are_lower_cased_in_listing_order() {
    assert_eq!(
        usb_ids(LSUSB),
        vec!["1d6b:0003", "05ac:12a8", "046d:c52b", "1d6b:0002"]
    );
}

#[test]
fn lsusb_lines_without_ids_are_ignored() {
    assert!(usb_ids("lsusb: cannot open /dev/bus/usb\n").is_empty());
}

#[test]
fn cdrom_info_lists_every_drive() {
    assert_eq!(cdrom_drive_names(CDROM_INFO), vec!["sr1", "sr0"]);
    assert!(cdrom_drive_names("CD-ROM information\n").is_empty());
}
