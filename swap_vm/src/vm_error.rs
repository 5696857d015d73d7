/*
 *  Copyright (C) 2025  Markus Elias Gerber
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  You should have received a copy of the GNU General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use core::fmt::{self, Display};

/// Errors reported back to the caller of an address space operation.
///
/// None of these halt the system. Depending on the operation the faulting process
/// is usually killed by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmError {
    /// The requested range reaches into the kernel half
    AboveKernelBase,

    /// `old_top`/`new_top` do not describe a valid range for this operation
    InvalidRange,

    /// No physical frame was left, all pages mapped by this call were released again
    OutOfMemory,

    /// The address was never validly allocated
    SegmentationFault { address: u32 },

    /// The page exists but does not allow this access
    ProtectionFault { address: u32 },

    /// Swapping can not be enabled for this process
    SwapNotAllowed,

    /// Initial image does not fit into a single page
    ImageTooLarge,

    /// The parent's swapped pages could not be copied to the child
    SwapCopyFailed,
}

impl Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmError::AboveKernelBase => write!(f, "range crosses the kernel base"),
            VmError::InvalidRange => write!(f, "invalid range"),
            VmError::OutOfMemory => write!(f, "out of memory"),
            VmError::SegmentationFault { address } => {
                write!(f, "segmentation fault at {:#x}", address)
            }
            VmError::ProtectionFault { address } => {
                write!(f, "protection fault at {:#x}", address)
            }
            VmError::SwapNotAllowed => write!(f, "swapping not allowed for this process"),
            VmError::ImageTooLarge => write!(f, "initial image larger than a page"),
            VmError::SwapCopyFailed => write!(f, "could not copy swapped pages"),
        }
    }
}
