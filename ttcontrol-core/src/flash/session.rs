//! Streamed programming session.

use embedded_io_async::{Read, Write};
use ttcontrol_hal::HostInterrupt;
use ttcontrol_protocol::{Report, Value};

use super::error::{FlashError, SessionError};
use super::geometry::{FlashGeometry, MAX_ADDRESS, MAX_PAGE_SIZE};
use super::stream::{read_chunk_length, read_error};
use crate::traits::SpiFlash;

/// Report key for session progress
const PROGRESS_KEY: &str = "flash_prog";

/// Masks the host interrupt character while alive
///
/// The previous state is restored on drop, whichever way the session ends.
pub struct InterruptGuard<'a, H: HostInterrupt + ?Sized> {
    host: &'a mut H,
    previous: bool,
}

impl<'a, H: HostInterrupt + ?Sized> InterruptGuard<'a, H> {
    /// Disable the interrupt character until the guard is dropped
    pub fn mask(host: &'a mut H) -> Self {
        let previous = host.is_enabled();
        host.set_enabled(false);
        Self { host, previous }
    }
}

impl<H: HostInterrupt + ?Sized> Drop for InterruptGuard<'_, H> {
    fn drop(&mut self) {
        self.host.set_enabled(self.previous);
    }
}

/// Progress of one programming session
#[derive(Debug, Clone)]
pub struct ProgramSession {
    geometry: FlashGeometry,
    cursor: u32,
    bytes_written: u32,
    verify: bool,
    /// End of the region erased so far in this session
    erased_until: u32,
}

impl ProgramSession {
    /// Start a session writing at `address`
    pub fn new(address: u32, verify: bool, geometry: FlashGeometry) -> Self {
        let geometry = FlashGeometry {
            page_size: geometry.page_size.min(MAX_PAGE_SIZE),
            ..geometry
        };
        Self {
            geometry,
            cursor: address,
            bytes_written: 0,
            verify,
            erased_until: geometry.erase_base(address),
        }
    }

    /// Address the next chunk will be written to
    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    /// Total payload bytes programmed
    pub fn bytes_written(&self) -> u32 {
        self.bytes_written
    }

    /// Whether each page is read back after programming
    pub fn verify(&self) -> bool {
        self.verify
    }

    /// Erase every block below `end` not yet erased in this session
    fn erase_through<F: SpiFlash>(
        &mut self,
        flash: &mut F,
        end: u32,
    ) -> Result<(), FlashError<F::BusError>> {
        while self.erased_until < end {
            flash.erase_sector(self.erased_until)?;
            self.erased_until += self.geometry.erase_size;
        }
        Ok(())
    }

    /// Stream `len` bytes from `source` into flash at the cursor
    pub async fn program_chunk<F: SpiFlash, R: Read>(
        &mut self,
        flash: &mut F,
        source: &mut R,
        len: u32,
    ) -> Result<(), SessionError<F::BusError>> {
        if len == 0 {
            return Ok(());
        }

        let end = self
            .cursor
            .checked_add(len)
            .filter(|&end| end <= MAX_ADDRESS + 1)
            .ok_or(SessionError::Flash(FlashError::AddressOutOfRange))?;

        self.erase_through(flash, end)?;

        let mut page = [0u8; MAX_PAGE_SIZE as usize];
        let mut readback = [0u8; MAX_PAGE_SIZE as usize];

        for segment in self.geometry.page_segments(self.cursor, len) {
            let data = &mut page[..segment.len as usize];
            source.read_exact(data).await.map_err(read_error)?;
            flash.program(segment.address, data)?;

            if self.verify {
                let check = &mut readback[..segment.len as usize];
                flash.read_data(segment.address, check)?;
                compare(segment.address, data, check)?;
            }
        }

        self.cursor = end;
        self.bytes_written += len;
        Ok(())
    }
}

/// First differing byte as a verification failure at its flash address
fn compare<E>(address: u32, expected: &[u8], actual: &[u8]) -> Result<(), SessionError<E>> {
    match expected.iter().zip(actual).position(|(a, b)| a != b) {
        Some(i) => Err(SessionError::VerificationFailure {
            address: address + i as u32,
        }),
        None => Ok(()),
    }
}

/// Program one in-memory block at `address`, then optionally read it back
///
/// Nothing is erased first; the target range must already be blank.
pub fn program_block<F: SpiFlash>(
    flash: &mut F,
    address: u32,
    data: &[u8],
    verify: bool,
) -> Result<(), SessionError<F::BusError>> {
    address
        .checked_add(data.len() as u32)
        .filter(|&end| end <= MAX_ADDRESS + 1)
        .ok_or(SessionError::Flash(FlashError::AddressOutOfRange))?;

    flash.program(address, data)?;

    if verify {
        let mut readback = [0u8; MAX_PAGE_SIZE as usize];
        for (n, expected) in data.chunks(readback.len()).enumerate() {
            let at = address + (n * readback.len()) as u32;
            let check = &mut readback[..expected.len()];
            flash.read_data(at, check)?;
            compare(at, expected, check)?;
        }
    }
    Ok(())
}

async fn report<W: Write, E>(sink: &mut W, value: Value<'_>) -> Result<(), SessionError<E>> {
    let line = Report::new(PROGRESS_KEY, value).map_err(|_| SessionError::Link)?;
    sink.write_all(line.as_bytes())
        .await
        .map_err(|_| SessionError::Link)?;
    sink.flush().await.map_err(|_| SessionError::Link)
}

/// Program a stream of length-prefixed chunks starting at `address`
///
/// Emits the start address once ready, the cursor after each chunk and
/// `ok` when the terminating `0` length is read. The host interrupt
/// character is masked throughout. Returns the number of bytes written.
pub async fn program_sectors<F, R, W, H>(
    flash: &mut F,
    source: &mut R,
    sink: &mut W,
    interrupt: &mut H,
    address: u32,
    verify: bool,
) -> Result<u32, SessionError<F::BusError>>
where
    F: SpiFlash,
    R: Read,
    W: Write,
    H: HostInterrupt + ?Sized,
{
    if address > MAX_ADDRESS {
        return Err(FlashError::AddressOutOfRange.into());
    }

    let _mask = InterruptGuard::mask(interrupt);
    let mut session = ProgramSession::new(address, verify, flash.geometry());

    report(sink, Value::Hex(address)).await?;

    loop {
        let len = read_chunk_length(source).await?;
        if len == 0 {
            break;
        }
        session.program_chunk(flash, source, len).await?;
        report(sink, Value::Hex(session.cursor())).await?;
    }

    report(sink, Value::Text("ok")).await?;
    Ok(session.bytes_written())
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;
    use std::vec::Vec;

    const MEM_SIZE: usize = 0x10000;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Op {
        Erase(u32),
        Program(u32, usize),
        Read(u32, usize),
    }

    /// In-memory NOR flash: erase sets bytes to 0xFF, programming clears bits
    struct MemFlash {
        geometry: FlashGeometry,
        mem: Vec<u8>,
        ops: Vec<Op>,
        stuck_zero: Option<u32>,
    }

    impl MemFlash {
        fn new(geometry: FlashGeometry) -> Self {
            Self {
                geometry,
                mem: std::vec![0xA5; MEM_SIZE],
                ops: Vec::new(),
                stuck_zero: None,
            }
        }
    }

    impl SpiFlash for MemFlash {
        type BusError = ();

        fn geometry(&self) -> FlashGeometry {
            self.geometry
        }

        fn read_status(&mut self) -> Result<u8, FlashError<()>> {
            Ok(0)
        }

        fn identify(&mut self) -> Result<[u8; 3], FlashError<()>> {
            Ok([0xEF, 0x40, 0x18])
        }

        fn erase_sector(&mut self, address: u32) -> Result<(), FlashError<()>> {
            self.ops.push(Op::Erase(address));
            let start = address as usize;
            let end = start + self.geometry.erase_size as usize;
            self.mem[start..end].fill(0xFF);
            Ok(())
        }

        fn program(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError<()>> {
            self.ops.push(Op::Program(address, data.len()));
            for (i, b) in data.iter().enumerate() {
                let a = address as usize + i;
                self.mem[a] &= *b;
                if self.stuck_zero == Some(a as u32) {
                    self.mem[a] = 0;
                }
            }
            Ok(())
        }

        fn read_data(&mut self, address: u32, buf: &mut [u8]) -> Result<(), FlashError<()>> {
            self.ops.push(Op::Read(address, buf.len()));
            let start = address as usize;
            buf.copy_from_slice(&self.mem[start..start + buf.len()]);
            Ok(())
        }
    }

    struct Flag(bool);

    impl HostInterrupt for Flag {
        fn set_enabled(&mut self, enabled: bool) {
            self.0 = enabled;
        }

        fn is_enabled(&self) -> bool {
            self.0
        }
    }

    #[derive(Default)]
    struct Sink(Vec<u8>);

    impl embedded_io_async::ErrorType for Sink {
        type Error = core::convert::Infallible;
    }

    impl Write for Sink {
        async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }
    }

    fn stream(chunks: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        for chunk in chunks {
            out.extend_from_slice(std::format!("{}\n", chunk.len()).as_bytes());
            out.extend_from_slice(chunk);
        }
        out.extend_from_slice(b"0\n");
        out
    }

    fn payload(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(7).wrapping_add(seed)).collect()
    }

    fn run(
        flash: &mut MemFlash,
        input: &[u8],
        address: u32,
        verify: bool,
    ) -> (Result<u32, SessionError<()>>, std::string::String, bool) {
        let mut source = input;
        let mut sink = Sink::default();
        let mut interrupt = Flag(true);
        let result = block_on(program_sectors(
            flash,
            &mut source,
            &mut sink,
            &mut interrupt,
            address,
            verify,
        ));
        let text = std::string::String::from_utf8(sink.0).unwrap();
        (result, text, interrupt.0)
    }

    #[test]
    fn test_single_chunk_over_two_pages() {
        let mut flash = MemFlash::new(FlashGeometry::default());
        let data = payload(300, 1);
        let (result, text, interrupt) = run(&mut flash, &stream(&[&data]), 0x1000, true);

        assert_eq!(result, Ok(300));
        assert_eq!(text, "flash_prog=0x1000\nflash_prog=0x112c\nflash_prog=ok\n");
        assert!(interrupt);
        assert_eq!(
            flash.ops,
            [
                Op::Erase(0x1000),
                Op::Erase(0x1100),
                Op::Program(0x1000, 256),
                Op::Read(0x1000, 256),
                Op::Program(0x1100, 44),
                Op::Read(0x1100, 44),
            ]
        );
        assert_eq!(&flash.mem[0x1000..0x112C], &data[..]);
    }

    #[test]
    fn test_block_erased_once_per_session() {
        let geometry = FlashGeometry {
            erase_size: 4096,
            ..FlashGeometry::default()
        };
        let mut flash = MemFlash::new(geometry);
        let first = payload(300, 2);
        let second = payload(300, 3);
        let (result, text, _) = run(&mut flash, &stream(&[&first, &second]), 0x2000, false);

        assert_eq!(result, Ok(600));
        assert_eq!(
            text,
            "flash_prog=0x2000\nflash_prog=0x212c\nflash_prog=0x2258\nflash_prog=ok\n"
        );
        let erases: Vec<_> = flash.ops.iter().filter(|op| matches!(op, Op::Erase(_))).collect();
        assert_eq!(erases, [&Op::Erase(0x2000)]);
        assert!(!flash.ops.iter().any(|op| matches!(op, Op::Read(..))));
        assert_eq!(&flash.mem[0x2000..0x212C], &first[..]);
        assert_eq!(&flash.mem[0x212C..0x2258], &second[..]);
    }

    #[test]
    fn test_unaligned_start() {
        let mut flash = MemFlash::new(FlashGeometry::default());
        let data = payload(20, 4);
        let (result, _, _) = run(&mut flash, &stream(&[&data]), 0x30F8, true);

        assert_eq!(result, Ok(20));
        assert_eq!(
            flash.ops,
            [
                Op::Erase(0x3000),
                Op::Erase(0x3100),
                Op::Program(0x30F8, 8),
                Op::Read(0x30F8, 8),
                Op::Program(0x3100, 12),
                Op::Read(0x3100, 12),
            ]
        );
        assert_eq!(&flash.mem[0x30F8..0x310C], &data[..]);
    }

    #[test]
    fn test_empty_session() {
        let mut flash = MemFlash::new(FlashGeometry::default());
        let (result, text, interrupt) = run(&mut flash, b"0\n", 0x1000, true);
        assert_eq!(result, Ok(0));
        assert_eq!(text, "flash_prog=0x1000\nflash_prog=ok\n");
        assert!(flash.ops.is_empty());
        assert!(interrupt);
    }

    #[test]
    fn test_underrun_restores_interrupt() {
        let mut flash = MemFlash::new(FlashGeometry::default());
        let mut input = Vec::from(&b"300\n"[..]);
        input.extend_from_slice(&payload(100, 5));
        let (result, text, interrupt) = run(&mut flash, &input, 0x1000, true);

        assert_eq!(result, Err(SessionError::ProtocolUnderrun));
        assert_eq!(text, "flash_prog=0x1000\n");
        assert!(interrupt);
    }

    #[test]
    fn test_interrupt_char_is_payload() {
        let mut flash = MemFlash::new(FlashGeometry::default());
        let data = [0x03u8; 16];
        let (result, _, _) = run(&mut flash, &stream(&[&data]), 0, true);
        assert_eq!(result, Ok(16));
        assert_eq!(&flash.mem[..16], &data[..]);
    }

    #[test]
    fn test_verification_failure() {
        let mut flash = MemFlash::new(FlashGeometry::default());
        flash.stuck_zero = Some(0x1005);
        let data = [0xFFu8; 32];
        let (result, text, interrupt) = run(&mut flash, &stream(&[&data]), 0x1000, true);

        assert_eq!(result, Err(SessionError::VerificationFailure { address: 0x1005 }));
        assert!(!text.contains("ok"));
        assert!(interrupt);
    }

    #[test]
    fn test_malformed_header() {
        let mut flash = MemFlash::new(FlashGeometry::default());
        let (result, _, _) = run(&mut flash, b"abc\n", 0x1000, true);
        assert_eq!(result, Err(SessionError::MalformedChunkHeader));
        assert!(flash.ops.is_empty());
    }

    #[test]
    fn test_address_out_of_range() {
        let mut flash = MemFlash::new(FlashGeometry::default());
        let (result, text, _) = run(&mut flash, b"0\n", 0x0100_0000, true);
        assert_eq!(result, Err(SessionError::Flash(FlashError::AddressOutOfRange)));
        assert!(text.is_empty());

        let (result, _, _) = run(&mut flash, b"16\n", 0x00FF_FFF8, true);
        assert_eq!(result, Err(SessionError::Flash(FlashError::AddressOutOfRange)));
    }

    #[test]
    fn test_program_block_does_not_erase() {
        let mut flash = MemFlash::new(FlashGeometry::default());
        flash.mem[0x1F0..0x220].fill(0xFF);
        let data = payload(40, 6);

        assert_eq!(program_block(&mut flash, 0x1F0, &data, true), Ok(()));
        assert_eq!(&flash.mem[0x1F0..0x218], &data[..]);
        assert!(!flash.ops.iter().any(|op| matches!(op, Op::Erase(_))));
        assert!(flash.ops.contains(&Op::Read(0x1F0, 40)));
    }

    #[test]
    fn test_program_block_verify() {
        let mut flash = MemFlash::new(FlashGeometry::default());
        // Not erased: 0xA5 & 0xFF leaves 0xA5
        let data = [0xFFu8; 8];
        assert_eq!(
            program_block(&mut flash, 0x400, &data, true),
            Err(SessionError::VerificationFailure { address: 0x400 })
        );

        flash.ops.clear();
        assert_eq!(program_block(&mut flash, 0x400, &data, false), Ok(()));
        assert_eq!(flash.ops, [Op::Program(0x400, 8)]);
    }

    #[test]
    fn test_program_block_range() {
        let mut flash = MemFlash::new(FlashGeometry::default());
        assert_eq!(
            program_block(&mut flash, 0x00FF_FFFC, &[0; 8], false),
            Err(SessionError::Flash(FlashError::AddressOutOfRange))
        );
        assert!(flash.ops.is_empty());
    }

    #[test]
    fn test_guard_restores_disabled_state() {
        let mut flag = Flag(false);
        {
            let _guard = InterruptGuard::mask(&mut flag);
        }
        assert!(!flag.0);

        let mut flag = Flag(true);
        {
            let guard = InterruptGuard::mask(&mut flag);
            assert!(!guard.host.is_enabled());
        }
        assert!(flag.0);
    }
}
